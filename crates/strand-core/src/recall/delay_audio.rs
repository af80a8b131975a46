//! Tact generator
//!
//! The persistent clock recall of an audio: it survives every natural
//! done transition and only leaves the graph on explicit cancel. Its
//! `tact` port stretches sequencer steps relative to the soundcard's
//! step grid and is rewritten by the apply-tact task while voices play.

use std::sync::Arc;

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::voice::RecallId;

pub const TACT_PORT: &str = "tact";

/// Persistent per-audio step clock
pub struct DelayAudio {
    base: RecallBase,
    /// Soundcard steps seen since the voice started
    steps: u64,
}

impl DelayAudio {
    /// Template plus its container-shared tact port
    pub fn template() -> (Box<dyn Recall>, Arc<Port>) {
        let tact = Port::new(TACT_PORT, PortValue::Float(1.0));
        let template = Box::new(Self {
            base: RecallBase::template("delay-audio", RecallScope::Audio)
                .with_persistent()
                .with_ports(vec![Arc::clone(&tact)]),
            steps: 0,
        });
        (template, tact)
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl Recall for DelayAudio {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, _voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            steps: 0,
        })
    }

    fn run_pre(&mut self, tick: &TickContext) {
        if tick.step_begins {
            self.steps += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::{stage_recall, test_tick, Stage};
    use crate::types::SoundScope;
    use crate::voice::RecyclingContext;

    #[test]
    fn test_persistent_survives_done() {
        let (template, _tact) = DelayAudio::template();
        let id = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        let mut instance = template.duplicate(&id, &voice);

        instance.base_mut().done();
        assert!(!instance.base().flags().done);

        instance.base_mut().cancel();
        stage_recall(instance.as_mut(), Stage::Pre, &test_tick(64));
        assert!(instance.base().flags().done);
    }

    #[test]
    fn test_tact_port_is_shared_with_instances() {
        let (template, tact) = DelayAudio::template();
        let id = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        let instance = template.duplicate(&id, &voice);

        tact.safe_write(PortValue::Float(2.0));
        assert_eq!(
            instance.base().port(TACT_PORT).unwrap().safe_read().as_float(),
            2.0
        );
    }
}
