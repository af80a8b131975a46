//! Notation playback
//!
//! The pitched-note chain across all five levels: the audio level binds
//! the notation timeline, the channel level one input lane, the
//! channel-run walks notes at each step and opens a signal per note-on,
//! the recycling level drives the open/continue/close framing, and the
//! stream-signal level advances the consumer cursors.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::{Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::graph::Recycling;
use crate::timeline::Notation;
use crate::types::ChannelId;
use crate::voice::RecallId;

/// Audio-level data: binds the notation timeline
pub struct NotationAudio {
    base: RecallBase,
}

impl NotationAudio {
    pub fn template() -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-notation-audio", RecallScope::Audio),
        })
    }
}

impl Recall for NotationAudio {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, _voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
        })
    }
}

/// Channel-level data: binds one input lane
pub struct NotationChannel {
    base: RecallBase,
}

impl NotationChannel {
    pub fn template(channel: ChannelId) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-notation-channel", RecallScope::Channel)
                .with_channel(channel),
        })
    }
}

impl Recall for NotationChannel {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, _voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
        })
    }
}

/// Channel-run level: opens one signal per note-on
pub struct NotationChannelRun {
    base: RecallBase,
    notation: Arc<Mutex<Notation>>,
    recycling: Arc<Mutex<Recycling>>,
    /// Lane filter: only notes on this `y` play through this channel
    lane: usize,
    voice: Option<Arc<VoiceContext>>,
}

impl NotationChannelRun {
    pub fn template(
        channel: ChannelId,
        lane: usize,
        notation: Arc<Mutex<Notation>>,
        recycling: Arc<Mutex<Recycling>>,
    ) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-notation-channel-run", RecallScope::ChannelRun)
                .with_channel(channel),
            notation,
            recycling,
            lane,
            voice: None,
        })
    }

    fn start_notes(&mut self, tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        if voice.expired.load(Ordering::Relaxed) {
            self.base.done();
            return;
        }
        if !tick.step_begins {
            return;
        }
        let offset = voice.sequencer_offset.load(Ordering::Relaxed);

        let starting: Vec<(u64, f64)> = {
            let notation = self.notation.lock().expect("notation lock poisoned");
            notation
                .find_at_offset(offset)
                .filter(|note| note.y == self.lane)
                .map(|note| (note.width(), note.velocity))
                .collect()
        };
        if starting.is_empty() {
            return;
        }

        let frames_per_step = tick.frames_per_step();
        let mut recycling = self.recycling.lock().expect("recycling lock poisoned");
        for (width, _velocity) in starting {
            let signal = recycling.create_signal();
            let mut signal = signal.lock().expect("signal lock poisoned");
            signal.set_attack(tick.attack);
            signal.set_delay(tick.absolute_delay);
            signal.set_frame_count(width * frames_per_step);
            signal.set_recall_id(Arc::clone(&voice.recall_id));
        }
    }
}

impl Recall for NotationChannelRun {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            notation: Arc::clone(&self.notation),
            recycling: Arc::clone(&self.recycling),
            lane: self.lane,
            voice: Some(Arc::clone(voice)),
        })
    }

    fn run_init_pre(&mut self, tick: &TickContext) {
        // the voice's first tick can carry a note at offset zero
        self.start_notes(tick);
    }

    fn run_pre(&mut self, tick: &TickContext) {
        self.start_notes(tick);
    }
}

/// Recycling level: drives the feed framing
///
/// Exactly one of open/continue/close runs per (signal, tick), selected
/// by the signal's feed state against its note interval.
pub struct FeedRecycling {
    base: RecallBase,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
}

impl FeedRecycling {
    pub fn template(recycling: Arc<Mutex<Recycling>>) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("feed-recycling", RecallScope::Recycling),
            recycling,
            voice: None,
        })
    }

    fn feed(&mut self, tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        let recycling = self.recycling.lock().expect("recycling lock poisoned");
        let template = recycling.template();
        let template = match template.lock() {
            Ok(template) => template,
            Err(_) => return,
        };

        for signal in recycling.signals() {
            let mut signal = match signal.lock() {
                Ok(signal) => signal,
                Err(_) => continue,
            };
            if signal.is_template()
                || signal.is_done()
                || signal.is_closed()
                || !signal.belongs_to(&voice.recall_id)
            {
                continue;
            }

            if signal.fed_frames() == 0 {
                signal.open_feed(&template);
            } else {
                let remaining = signal.frame_count().saturating_sub(signal.fed_frames());
                if remaining <= tick.buffer_size as u64 {
                    signal.close_feed(&template);
                } else {
                    signal.continue_feed(&template);
                }
            }
        }
    }
}

impl Recall for FeedRecycling {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            recycling: Arc::clone(&self.recycling),
            voice: Some(Arc::clone(voice)),
        })
    }

    fn run_init_inter(&mut self, tick: &TickContext) {
        self.feed(tick);
    }

    fn run_inter(&mut self, tick: &TickContext) {
        self.feed(tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::engine::gc::GcService;
    use crate::recall::{stage_recall, test_tick, Stage};
    use crate::timeline::Note;
    use crate::types::{AudioId, ChannelKind, SampleFormat, SoundScope};
    use crate::voice::RecyclingContext;

    struct Setup {
        _gc: GcService,
        recycling: Arc<Mutex<Recycling>>,
        channel_run: Box<dyn Recall>,
        feeder: Box<dyn Recall>,
        voice: Arc<VoiceContext>,
    }

    fn setup(notes: Vec<Note>) -> Setup {
        let gc = GcService::new();
        let channel = ChannelId::new(AudioId(0), ChannelKind::Input, 0);
        let recycling = Arc::new(Mutex::new(Recycling::new(
            channel,
            SampleFormat::S16,
            48000,
            16,
            &gc.handle(),
        )));
        {
            let recycling = recycling.lock().unwrap();
            let mut template = recycling.template().lock().unwrap();
            template.stream_resize(16);
            template.set_loop_bounds(Some((0, 16 * 16)));
            for i in 0..16 {
                if let Some(AudioBuffer::S16(b)) = template.buffer_at_mut(i) {
                    b.fill(500);
                }
            }
        }

        let mut notation = Notation::new();
        for note in notes {
            notation.add_note(note);
        }
        let notation = Arc::new(Mutex::new(notation));

        let id = RecallId::new(SoundScope::Notation, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);

        let channel_run = NotationChannelRun::template(
            channel,
            0,
            Arc::clone(&notation),
            Arc::clone(&recycling),
        )
        .duplicate(&id, &voice);
        let feeder = FeedRecycling::template(Arc::clone(&recycling)).duplicate(&id, &voice);

        Setup {
            _gc: gc,
            recycling,
            channel_run,
            feeder,
            voice,
        }
    }

    fn tick_pair(setup: &mut Setup, tick: &TickContext) {
        for stage in Stage::ALL {
            stage_recall(setup.channel_run.as_mut(), stage, tick);
            stage_recall(setup.feeder.as_mut(), stage, tick);
        }
    }

    #[test]
    fn test_note_on_opens_then_continues_then_closes() {
        // 3-step note at one period per step
        let mut setup = setup(vec![Note::new(0, 3, 0)]);
        let mut tick = test_tick(16);
        tick.absolute_delay = 1.0;
        tick.step_begins = true;

        // first tick: note created and opened (two periods ahead)
        tick_pair(&mut setup, &tick);
        {
            let recycling = setup.recycling.lock().unwrap();
            assert_eq!(recycling.signals().len(), 1);
            let signal = recycling.signals()[0].lock().unwrap();
            assert_eq!(signal.frame_count(), 48);
            assert_eq!(signal.fed_frames(), 32);
            assert!(!signal.is_closed());
        }

        // second tick: the remainder fits one period -> close
        setup.voice.sequencer_offset.store(1, Ordering::Relaxed);
        tick_pair(&mut setup, &tick);
        {
            let recycling = setup.recycling.lock().unwrap();
            let signal = recycling.signals()[0].lock().unwrap();
            assert!(signal.is_closed());
            assert!(signal.is_fully_fed());
        }

        // later ticks leave the sealed signal alone
        setup.voice.sequencer_offset.store(2, Ordering::Relaxed);
        tick_pair(&mut setup, &tick);
        {
            let recycling = setup.recycling.lock().unwrap();
            assert_eq!(recycling.signals().len(), 1);
        }
    }

    #[test]
    fn test_wrong_lane_ignored() {
        let mut setup = setup(vec![Note::new(0, 2, 3)]);
        let mut tick = test_tick(16);
        tick.absolute_delay = 1.0;
        tick_pair(&mut setup, &tick);
        assert!(setup.recycling.lock().unwrap().signals().is_empty());
    }

    #[test]
    fn test_interior_offset_starts_nothing() {
        let mut setup = setup(vec![Note::new(2, 4, 0)]);
        let mut tick = test_tick(16);
        tick.absolute_delay = 1.0;
        tick_pair(&mut setup, &tick);
        assert!(setup.recycling.lock().unwrap().signals().is_empty());

        // reaching x0 starts the note
        setup.voice.sequencer_offset.store(2, Ordering::Relaxed);
        tick_pair(&mut setup, &tick);
        assert_eq!(setup.recycling.lock().unwrap().signals().len(), 1);
    }
}
