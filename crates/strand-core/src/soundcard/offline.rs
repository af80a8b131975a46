//! Offline soundcard
//!
//! A soundcard with no device behind it: ticks are driven manually by
//! the caller. Tests drive it step by step; the exporter drives it as
//! fast as the render loop runs.

use super::{Soundcard, SoundcardPresets};
use crate::buffer::AudioBuffer;
use crate::types::{DEFAULT_BPM, DEFAULT_DELAY_FACTOR};

/// Application buffer ring slots
const RING_SLOTS: usize = 4;

/// Manual-tick soundcard for tests and offline rendering
pub struct OfflineSoundcard {
    presets: SoundcardPresets,
    bpm: f64,
    delay_factor: f64,
    /// Ring of application buffers, one `Vec` of per-channel buffers per slot
    ring: Vec<Vec<AudioBuffer>>,
    ring_index: usize,
    delay_counter: f64,
    attack: usize,
    note_offset: u64,
    note_offset_absolute: u64,
    loop_bounds: Option<(u64, u64)>,
    frame_count: u64,
}

impl OfflineSoundcard {
    pub fn new(presets: SoundcardPresets) -> Self {
        let ring = (0..RING_SLOTS)
            .map(|_| {
                (0..presets.channels)
                    .map(|_| AudioBuffer::silence(presets.format, presets.buffer_size))
                    .collect()
            })
            .collect();

        Self {
            presets,
            bpm: DEFAULT_BPM,
            delay_factor: DEFAULT_DELAY_FACTOR,
            ring,
            ring_index: 0,
            delay_counter: 0.0,
            attack: 0,
            note_offset: 0,
            note_offset_absolute: 0,
            loop_bounds: None,
            frame_count: 0,
        }
    }

}

impl Default for OfflineSoundcard {
    fn default() -> Self {
        Self::new(SoundcardPresets::default())
    }
}

impl Soundcard for OfflineSoundcard {
    fn presets(&self) -> SoundcardPresets {
        self.presets
    }

    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.max(1.0);
    }

    fn delay_factor(&self) -> f64 {
        self.delay_factor
    }

    fn set_delay_factor(&mut self, delay_factor: f64) {
        if delay_factor > 0.0 {
            self.delay_factor = delay_factor;
        }
    }

    fn attack(&self) -> usize {
        self.attack
    }

    fn delay_counter(&self) -> f64 {
        self.delay_counter
    }

    fn note_offset(&self) -> u64 {
        self.note_offset
    }

    fn set_note_offset(&mut self, note_offset: u64) {
        self.note_offset = note_offset;
        self.delay_counter = 0.0;
    }

    fn note_offset_absolute(&self) -> u64 {
        self.note_offset_absolute
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn loop_bounds(&self) -> Option<(u64, u64)> {
        self.loop_bounds
    }

    fn set_loop_bounds(&mut self, bounds: Option<(u64, u64)>) {
        self.loop_bounds = match bounds {
            Some((left, right)) if left < right => Some((left, right)),
            Some(_) => None,
            None => None,
        };
    }

    fn buffer_mut(&mut self) -> &mut [AudioBuffer] {
        &mut self.ring[self.ring_index]
    }

    fn next_buffer_mut(&mut self) -> &mut [AudioBuffer] {
        let next = (self.ring_index + 1) % RING_SLOTS;
        &mut self.ring[next]
    }

    fn prev_buffer(&self) -> &[AudioBuffer] {
        let prev = (self.ring_index + RING_SLOTS - 1) % RING_SLOTS;
        &self.ring[prev]
    }

    fn tic(&mut self) {
        // rotate the ring; the new current slot starts silent
        self.ring_index = (self.ring_index + 1) % RING_SLOTS;
        for buffer in &mut self.ring[self.ring_index] {
            buffer.clear();
        }

        let delay = self.absolute_delay();
        let buffer_size = self.presets.buffer_size;

        if self.delay_counter + 1.0 >= delay {
            let next = self.note_offset + 1;
            self.note_offset = match self.loop_bounds {
                Some((left, right)) if next >= right => left,
                _ => next,
            };
            self.note_offset_absolute += 1;
            self.attack =
                ((self.attack as f64 + delay.fract() * buffer_size as f64) as usize) % buffer_size;
            self.delay_counter = 0.0;
        } else {
            self.delay_counter += 1.0;
        }

        self.frame_count += buffer_size as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_offset_advances_after_delay_periods() {
        let mut soundcard = OfflineSoundcard::default();
        let delay = soundcard.absolute_delay();
        assert_eq!(soundcard.note_offset(), 0);

        // one full period advances the offset exactly once
        for _ in 0..delay.ceil() as usize {
            soundcard.tic();
        }
        assert_eq!(soundcard.note_offset(), 1);
    }

    #[test]
    fn test_loop_wraps_note_offset() {
        let mut soundcard = OfflineSoundcard::default();
        soundcard.set_loop_bounds(Some((0, 2)));
        let delay = soundcard.absolute_delay().ceil() as usize;

        for _ in 0..3 * delay {
            soundcard.tic();
        }
        assert!(soundcard.note_offset() < 2);
        assert!(soundcard.note_offset_absolute() >= 2);
    }

    #[test]
    fn test_invalid_loop_rejected() {
        let mut soundcard = OfflineSoundcard::default();
        soundcard.set_loop_bounds(Some((4, 4)));
        assert_eq!(soundcard.loop_bounds(), None);
    }

    #[test]
    fn test_ring_rotation_clears_current() {
        let mut soundcard = OfflineSoundcard::default();
        let format = soundcard.presets().format;
        let frames = soundcard.presets().buffer_size;

        // dirty every slot through a full rotation
        for _ in 0..RING_SLOTS {
            soundcard.buffer_mut()[0].copy_from_f32(&[0.5; 1024]);
            soundcard.tic();
        }
        assert_eq!(
            soundcard.buffer_mut()[0],
            AudioBuffer::silence(format, frames)
        );
    }

    #[test]
    fn test_frame_count_accumulates() {
        let mut soundcard = OfflineSoundcard::default();
        soundcard.tic();
        soundcard.tic();
        assert_eq!(soundcard.frame_count(), 2 * 1024);
    }
}
