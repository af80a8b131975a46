//! Sequencer position counter
//!
//! Maintains one voice's position within the sequencer loop and
//! publishes it through the voice context for the playback recalls.
//! With looping disabled the counter expires the voice at the loop end
//! instead of wrapping - the natural done path of a finite sequence.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::voice::RecallId;

pub const SEQUENCER_LENGTH_PORT: &str = "sequencer-length";
pub const LOOP_PORT: &str = "loop";

/// Per-voice step counter with loop/expiry handling
pub struct CountBeatsAudioRun {
    base: RecallBase,
    /// Tact port of the audio's delay container
    tact: Arc<Port>,
    voice: Option<Arc<VoiceContext>>,
    /// Soundcard steps accumulated toward the next sequencer step
    tact_accum: f64,
    offset: u64,
    started: bool,
}

impl CountBeatsAudioRun {
    /// Template plus its container-shared ports
    ///
    /// The tact port comes from the delay container - the counter's one
    /// upstream dependency, injected at map time.
    pub fn template(tact: Arc<Port>, sequencer_length: u64) -> (Box<dyn Recall>, Vec<Arc<Port>>) {
        let ports = vec![
            Port::new(SEQUENCER_LENGTH_PORT, PortValue::UInt(sequencer_length)),
            Port::new(LOOP_PORT, PortValue::Bool(true)),
        ];
        let template = Box::new(Self {
            base: RecallBase::template("count-beats", RecallScope::Audio)
                .with_ports(ports.clone()),
            tact,
            voice: None,
            tact_accum: 0.0,
            offset: 0,
            started: false,
        });
        (template, ports)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Recall for CountBeatsAudioRun {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            tact: Arc::clone(&self.tact),
            voice: Some(Arc::clone(voice)),
            tact_accum: 0.0,
            offset: 0,
            started: false,
        })
    }

    fn run_init_pre(&mut self, tick: &TickContext) {
        // a voice starting on a step boundary counts that step as zero
        if tick.step_begins {
            self.started = true;
            if let Some(voice) = &self.voice {
                voice.sequencer_offset.store(0, Ordering::Relaxed);
            }
        }
    }

    fn run_pre(&mut self, tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        if !tick.step_begins {
            return;
        }

        // a voice that started mid-step begins counting at the first
        // full boundary
        if !self.started {
            self.started = true;
            voice.sequencer_offset.store(0, Ordering::Relaxed);
            return;
        }

        let tact = self.tact.safe_read().as_float().max(f64::MIN_POSITIVE);
        self.tact_accum += 1.0;
        while self.tact_accum >= tact {
            self.tact_accum -= tact;
            self.offset += 1;
        }

        let length = self
            .base
            .port(SEQUENCER_LENGTH_PORT)
            .map(|port| port.safe_read().as_uint())
            .unwrap_or(16)
            .max(1);

        if self.offset >= length {
            let looping = self
                .base
                .port(LOOP_PORT)
                .map(|port| port.safe_read().as_bool())
                .unwrap_or(true);
            if looping {
                self.offset %= length;
            } else {
                voice.expired.store(true, Ordering::Relaxed);
                self.base.done();
                return;
            }
        }

        voice.sequencer_offset.store(self.offset, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::{stage_recall, test_tick, Stage};
    use crate::types::SoundScope;
    use crate::voice::RecyclingContext;

    fn instance(sequencer_length: u64) -> (Box<dyn Recall>, Arc<VoiceContext>, Arc<Port>) {
        let tact = Port::new("tact", PortValue::Float(1.0));
        let (template, _ports) = CountBeatsAudioRun::template(Arc::clone(&tact), sequencer_length);
        let id = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        let instance = template.duplicate(&id, &voice);
        (instance, voice, tact)
    }

    /// Run full ticks; the first tick only initializes, the second is
    /// the voice's first counted step
    fn run_ticks(recall: &mut Box<dyn Recall>, ticks: usize) {
        let mut tick = test_tick(64);
        tick.step_begins = true;
        for _ in 0..ticks {
            for stage in Stage::ALL {
                stage_recall(recall.as_mut(), stage, &tick);
            }
        }
    }

    #[test]
    fn test_counts_and_wraps() {
        let (mut recall, voice, _tact) = instance(4);
        // the init tick is the voice's step zero
        run_ticks(&mut recall, 1);
        assert_eq!(voice.sequencer_offset.load(Ordering::Relaxed), 0);

        run_ticks(&mut recall, 3);
        assert_eq!(voice.sequencer_offset.load(Ordering::Relaxed), 3);

        run_ticks(&mut recall, 1);
        assert_eq!(
            voice.sequencer_offset.load(Ordering::Relaxed),
            0,
            "wraps at sequencer length"
        );
        assert!(!voice.expired.load(Ordering::Relaxed));
    }

    #[test]
    fn test_expires_without_loop() {
        let (mut recall, voice, _tact) = instance(2);
        recall
            .base()
            .port(LOOP_PORT)
            .unwrap()
            .safe_write(PortValue::Bool(false));

        run_ticks(&mut recall, 4);
        assert!(voice.expired.load(Ordering::Relaxed));
        assert!(recall.base().flags().done);
    }

    #[test]
    fn test_tact_stretches_steps() {
        let (mut recall, voice, tact) = instance(16);
        tact.safe_write(PortValue::Float(2.0));

        // 4 counted steps at tact 2 -> sequencer offset 2
        run_ticks(&mut recall, 6);
        assert_eq!(voice.sequencer_offset.load(Ordering::Relaxed), 2);
    }
}
