//! Audio signal - one voice's PCM stream on one recycling
//!
//! The stream is a list of fixed-length buffers produced ahead of the
//! playback cursor and consumed at it. Three mutually exclusive framing
//! operations drive note playback: `open_feed` on the first audible
//! tick (splices attack-offset data from the template), `continue_feed`
//! on interior ticks, `close_feed` on the last tick (truncates and
//! fades at the note's end boundary).

use std::sync::Arc;

use crate::buffer::{apply_ramp, copy_buffer_to_buffer, AudioBuffer, CopyMode};
use crate::types::SampleFormat;
use crate::voice::RecallId;

/// Frames the closing fade covers at the end of a note
const CLOSE_FADE_FRAMES: usize = 64;

/// A per-voice stream of fixed-length sample buffers
pub struct AudioSignal {
    format: SampleFormat,
    samplerate: u32,
    buffer_size: usize,
    stream: Vec<AudioBuffer>,
    /// Consumer cursor into `stream`
    stream_current: usize,
    /// Frames this signal is intended to carry once fully fed
    frame_count: u64,
    /// Frames written so far by the feed operations
    fed_frames: u64,
    /// Phase offset of the first frame inside the first buffer
    attack: usize,
    /// Buffer periods per sequencer step at creation time
    delay: f64,
    /// Loop region of a template, in frames, for sustained feeds
    loop_bounds: Option<(u64, u64)>,
    /// The voice this signal belongs to; templates carry none
    recall_id: Option<Arc<RecallId>>,
    /// Set once `close_feed` has sealed the end boundary
    closed: bool,
    template: bool,
    done: bool,
}

impl AudioSignal {
    pub fn new(format: SampleFormat, samplerate: u32, buffer_size: usize) -> Self {
        Self {
            format,
            samplerate,
            buffer_size,
            stream: Vec::new(),
            stream_current: 0,
            frame_count: 0,
            fed_frames: 0,
            attack: 0,
            delay: 0.0,
            loop_bounds: None,
            recall_id: None,
            closed: false,
            template: false,
            done: false,
        }
    }

    /// Create the canonical template signal for a recycling
    pub fn new_template(format: SampleFormat, samplerate: u32, buffer_size: usize) -> Self {
        let mut signal = Self::new(format, samplerate, buffer_size);
        signal.template = true;
        signal
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn is_template(&self) -> bool {
        self.template
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Mark the stream as fully consumed; the recycling's cleanup pass
    /// removes done signals between ticks
    pub fn set_done(&mut self) {
        self.done = true;
    }

    /// Buffers currently allocated
    pub fn length(&self) -> usize {
        self.stream.len()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn set_frame_count(&mut self, frame_count: u64) {
        self.frame_count = frame_count;
    }

    pub fn attack(&self) -> usize {
        self.attack
    }

    pub fn set_attack(&mut self, attack: usize) {
        self.attack = attack % self.buffer_size.max(1);
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn set_delay(&mut self, delay: f64) {
        self.delay = delay;
    }

    pub fn recall_id(&self) -> Option<&Arc<RecallId>> {
        self.recall_id.as_ref()
    }

    pub fn set_recall_id(&mut self, recall_id: Arc<RecallId>) {
        self.recall_id = Some(recall_id);
    }

    /// Whether this signal belongs to `recall_id`'s voice
    pub fn belongs_to(&self, recall_id: &Arc<RecallId>) -> bool {
        self.recall_id
            .as_ref()
            .map(|id| Arc::ptr_eq(id, recall_id))
            .unwrap_or(false)
    }

    /// Frames written so far by the feed operations
    pub fn fed_frames(&self) -> u64 {
        self.fed_frames
    }

    /// Whether the feed has delivered everything the note asked for
    pub fn is_fully_fed(&self) -> bool {
        self.frame_count > 0 && self.fed_frames >= self.frame_count
    }

    /// Whether `close_feed` has sealed the end boundary
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn loop_bounds(&self) -> Option<(u64, u64)> {
        self.loop_bounds
    }

    pub fn set_loop_bounds(&mut self, bounds: Option<(u64, u64)>) {
        self.loop_bounds = match bounds {
            Some((start, end)) if start < end => Some((start, end)),
            _ => None,
        };
    }

    /// Grow or shrink the stream to exactly `length` buffers
    ///
    /// Retained buffers keep their contents bit-identically; new buffers
    /// are zero-filled. The cursor is untouched while it still points
    /// into the stream and resets to the head otherwise.
    pub fn stream_resize(&mut self, length: usize) {
        if self.stream.len() < length {
            let grow = length - self.stream.len();
            self.stream.reserve(grow);
            for _ in 0..grow {
                self.stream
                    .push(AudioBuffer::silence(self.format, self.buffer_size));
            }
        } else {
            self.stream.truncate(length);
            if self.stream_current >= length {
                self.stream_current = 0;
            }
        }
    }

    /// Append exactly one zero-filled buffer at the tail
    pub fn add_stream(&mut self) {
        self.stream
            .push(AudioBuffer::silence(self.format, self.buffer_size));
    }

    /// The buffer under the consumer cursor
    pub fn current_buffer(&self) -> Option<&AudioBuffer> {
        self.stream.get(self.stream_current)
    }

    pub fn current_buffer_mut(&mut self) -> Option<&mut AudioBuffer> {
        self.stream.get_mut(self.stream_current)
    }

    /// Buffer at `index`, counted from the stream head
    pub fn buffer_at_mut(&mut self, index: usize) -> Option<&mut AudioBuffer> {
        self.stream.get_mut(index)
    }

    /// Advance the consumer cursor one buffer
    ///
    /// Returns false once the stream is exhausted - the consumer then
    /// marks the signal done (stream exhaustion is not an error).
    pub fn advance(&mut self) -> bool {
        if self.stream_current + 1 < self.stream.len() {
            self.stream_current += 1;
            true
        } else {
            false
        }
    }

    /// Consumer cursor position
    pub fn position(&self) -> usize {
        self.stream_current
    }

    /// Copy a whole template stream into this signal, converting formats
    ///
    /// One-shot triggers (the pattern sequencer) use this instead of the
    /// feed operations.
    pub fn duplicate_stream_from(&mut self, template: &AudioSignal) {
        self.stream_resize(template.length());
        self.frame_count = template.length() as u64 * template.buffer_size as u64;
        self.fed_frames = self.frame_count;
        self.closed = true;

        let mode = CopyMode::new(self.format, template.format);
        for (dst, src) in self.stream.iter_mut().zip(template.stream.iter()) {
            dst.clear();
            copy_buffer_to_buffer(dst, 0, src, 0, self.buffer_size.min(template.buffer_size), mode);
        }
    }

    /// Read `count` template frames starting at `src_frame` into this
    /// stream at `dst_frame`, honoring the template's loop region
    fn splice_from(&mut self, template: &AudioSignal, src_frame: u64, dst_frame: u64, count: u64) {
        let mode = CopyMode::new(self.format, template.format);
        let buffer_size = self.buffer_size as u64;
        let template_frames = template.length() as u64 * template.buffer_size as u64;
        if template_frames == 0 {
            return;
        }

        let mut copied = 0u64;
        while copied < count {
            // fold the source position into the template's loop region
            // once it runs past the end
            let mut src = src_frame + copied;
            if let Some((loop_start, loop_end)) = template.loop_bounds {
                if src >= loop_end && loop_end > loop_start {
                    src = loop_start + (src - loop_start) % (loop_end - loop_start);
                }
            }
            if src >= template_frames {
                break;
            }

            let dst = dst_frame + copied;
            let src_buffer = (src / template.buffer_size as u64) as usize;
            let src_offset = (src % template.buffer_size as u64) as usize;
            let dst_buffer = (dst / buffer_size) as usize;
            let dst_offset = (dst % buffer_size) as usize;

            // largest run that stays inside one source and one
            // destination buffer, and inside the loop region
            let mut run = (count - copied)
                .min(template.buffer_size as u64 - src_offset as u64)
                .min(buffer_size - dst_offset as u64);
            if let Some((_, loop_end)) = template.loop_bounds {
                if src < loop_end {
                    run = run.min(loop_end - src);
                }
            }

            while self.stream.len() <= dst_buffer {
                self.add_stream();
            }

            let source = match template.stream.get(src_buffer) {
                Some(buffer) => buffer,
                None => break,
            };
            copy_buffer_to_buffer(
                &mut self.stream[dst_buffer],
                dst_offset,
                source,
                src_offset,
                run as usize,
                mode,
            );

            copied += run;
        }
    }

    /// First feed of a note: allocate the head of the stream and splice
    /// the leading periods from the template at the attack offset
    ///
    /// Produces two periods (capped at the note's frame count) so the
    /// feed stays one buffer ahead of the consumer cursor.
    pub fn open_feed(&mut self, template: &AudioSignal) {
        let buffer_size = self.buffer_size as u64;
        let mut count = 2 * buffer_size;
        if self.frame_count > 0 {
            count = count.min(self.frame_count);
        }

        let head = (self.attack as u64 + count).div_ceil(buffer_size) as usize;
        self.stream_resize(self.length().max(head));

        self.splice_from(template, 0, self.attack as u64, count);
        self.fed_frames = count;
    }

    /// Interior feed: straight copy of the next period
    pub fn continue_feed(&mut self, template: &AudioSignal) {
        let buffer_size = self.buffer_size as u64;
        self.splice_from(template, self.fed_frames, self.attack as u64 + self.fed_frames, buffer_size);
        self.fed_frames += buffer_size;
    }

    /// Final feed: copy up to the note's end boundary, fade the tail
    /// and truncate the stream past it
    pub fn close_feed(&mut self, template: &AudioSignal) {
        let remaining = self.frame_count.saturating_sub(self.fed_frames);
        if remaining > 0 {
            self.splice_from(
                template,
                self.fed_frames,
                self.attack as u64 + self.fed_frames,
                remaining,
            );
            self.fed_frames += remaining;
        }

        let buffer_size = self.buffer_size as u64;
        // first silent frame after the note
        let end = self.attack as u64 + self.frame_count;

        // fade into the end boundary, one buffer segment at a time
        let fade = (CLOSE_FADE_FRAMES as u64)
            .min(buffer_size / 2)
            .min(self.frame_count);
        if fade > 0 {
            let fade_start = end - fade;
            let mut frame = fade_start;
            while frame < end {
                let index = (frame / buffer_size) as usize;
                let offset = (frame % buffer_size) as usize;
                let run = (end - frame).min(buffer_size - offset as u64);
                if let Some(buffer) = self.stream.get_mut(index) {
                    let gain_from = 1.0 - (frame - fade_start) as f64 / fade as f64;
                    let gain_to = 1.0 - (frame + run - fade_start) as f64 / fade as f64;
                    apply_ramp(buffer, offset..offset + run as usize, gain_from, gain_to);
                }
                frame += run;
            }
        }

        // silence the rest of the boundary buffer, drop buffers past it
        let last_index = (end / buffer_size) as usize;
        let end_offset = (end % buffer_size) as usize;
        if end_offset > 0 {
            if let Some(buffer) = self.stream.get_mut(last_index) {
                let len = buffer.len();
                apply_ramp(buffer, end_offset..len, 0.0, 0.0);
            }
        }
        let keep = if end_offset > 0 { last_index + 1 } else { last_index };
        if keep < self.stream.len() {
            self.stream.truncate(keep.max(self.stream_current + 1));
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> AudioSignal {
        AudioSignal::new(SampleFormat::S16, 48000, 16)
    }

    fn filled_template(buffers: usize, value: i16) -> AudioSignal {
        let mut template = AudioSignal::new_template(SampleFormat::S16, 48000, 16);
        template.stream_resize(buffers);
        for i in 0..buffers {
            if let Some(AudioBuffer::S16(b)) = template.buffer_at_mut(i) {
                b.fill(value);
            }
        }
        template
    }

    #[test]
    fn test_stream_resize_grows_zero_filled() {
        let mut signal = signal();
        signal.stream_resize(3);
        assert_eq!(signal.length(), 3);
        for i in 0..3 {
            assert_eq!(
                signal.buffer_at_mut(i).unwrap(),
                &AudioBuffer::silence(SampleFormat::S16, 16)
            );
        }
    }

    #[test]
    fn test_stream_resize_preserves_prefix() {
        let mut signal = signal();
        signal.stream_resize(2);
        if let Some(AudioBuffer::S16(b)) = signal.buffer_at_mut(0) {
            b.fill(7);
        }
        if let Some(AudioBuffer::S16(b)) = signal.buffer_at_mut(1) {
            b.fill(9);
        }
        let before: Vec<AudioBuffer> = (0..2)
            .map(|i| signal.buffer_at_mut(i).unwrap().clone())
            .collect();

        signal.stream_resize(5);

        for i in 0..2 {
            assert_eq!(signal.buffer_at_mut(i).unwrap(), &before[i]);
        }
        for i in 2..5 {
            assert_eq!(
                signal.buffer_at_mut(i).unwrap(),
                &AudioBuffer::silence(SampleFormat::S16, 16)
            );
        }
    }

    #[test]
    fn test_stream_resize_shrink_resets_stray_cursor() {
        let mut signal = signal();
        signal.stream_resize(4);
        signal.advance();
        signal.advance();
        signal.advance();
        assert_eq!(signal.position(), 3);

        signal.stream_resize(2);
        assert_eq!(signal.position(), 0, "cursor off the end resets to head");

        signal.stream_resize(4);
        signal.advance();
        signal.stream_resize(3);
        assert_eq!(signal.position(), 1, "in-range cursor is untouched");
    }

    #[test]
    fn test_add_stream_appends_one() {
        let mut signal = signal();
        signal.add_stream();
        signal.add_stream();
        assert_eq!(signal.length(), 2);
    }

    #[test]
    fn test_advance_reports_exhaustion() {
        let mut signal = signal();
        signal.stream_resize(2);
        assert!(signal.advance());
        assert!(!signal.advance());
        assert_eq!(signal.position(), 1);
    }

    #[test]
    fn test_duplicate_stream_from_template() {
        let template = filled_template(3, 42);
        let mut signal = signal();
        signal.duplicate_stream_from(&template);

        assert_eq!(signal.length(), 3);
        assert_eq!(
            signal.buffer_at_mut(0).unwrap(),
            &AudioBuffer::S16(vec![42; 16].into_boxed_slice())
        );
    }

    #[test]
    fn test_open_feed_splices_at_attack() {
        let template = filled_template(4, 100);
        let mut signal = signal();
        signal.set_attack(4);
        signal.set_frame_count(32);
        signal.open_feed(&template);

        let head = match signal.buffer_at_mut(0).unwrap() {
            AudioBuffer::S16(b) => b.clone(),
            _ => unreachable!(),
        };
        assert!(head[..4].iter().all(|&v| v == 0), "pre-attack stays silent");
        assert!(head[4..].iter().all(|&v| v == 100));
    }

    #[test]
    fn test_feed_sequence_covers_note() {
        // a 48-frame note at 16-frame periods: open feeds two periods
        // ahead, continue one more, close seals the boundary
        let template = filled_template(4, 50);
        let mut signal = signal();
        signal.set_frame_count(48);
        signal.open_feed(&template);
        assert_eq!(signal.fed_frames(), 32);
        assert!(!signal.is_closed());

        signal.continue_feed(&template);
        assert!(signal.is_fully_fed());
        signal.close_feed(&template);
        assert!(signal.is_closed());

        assert!(signal.length() >= 3);
        let first = match signal.buffer_at_mut(0).unwrap() {
            AudioBuffer::S16(b) => b.clone(),
            _ => unreachable!(),
        };
        assert!(first.iter().all(|&v| v == 50));
    }

    #[test]
    fn test_close_feed_silences_past_boundary() {
        let template = filled_template(8, 80);
        let mut signal = signal();
        // end mid-buffer: 24 frames = one and a half periods
        signal.set_frame_count(24);
        signal.open_feed(&template);
        signal.close_feed(&template);

        let second = match signal.buffer_at_mut(1) {
            Some(AudioBuffer::S16(b)) => b.clone(),
            _ => panic!("second buffer missing"),
        };
        assert!(second[8..].iter().all(|&v| v == 0), "past x1 is silent");
    }

    #[test]
    fn test_splice_honors_template_loop() {
        let mut template = filled_template(1, 60);
        template.set_loop_bounds(Some((0, 16)));
        let mut signal = signal();
        signal.set_frame_count(64);
        signal.open_feed(&template);
        signal.continue_feed(&template);
        signal.continue_feed(&template);

        // past the template's 16 frames, the loop keeps feeding data
        let third = match signal.buffer_at_mut(2) {
            Some(AudioBuffer::S16(b)) => b.clone(),
            _ => panic!("third buffer missing"),
        };
        assert!(third.iter().all(|&v| v == 60));
    }
}
