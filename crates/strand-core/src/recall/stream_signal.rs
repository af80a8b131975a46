//! Stream cursor driver
//!
//! The audio-signal-level instance of the producing chains: advances the
//! consumer cursor of its voice's signals once per tick and marks a
//! signal done when the stream is exhausted - the normal end of a
//! note's life, not an error.

use std::sync::{Arc, Mutex};

use super::{Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::graph::Recycling;
use crate::voice::RecallId;

/// Advances per-voice signal streams; one per producing container
pub struct StreamSignal {
    base: RecallBase,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
}

impl StreamSignal {
    pub fn template(recycling: Arc<Mutex<Recycling>>) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("stream-signal", RecallScope::AudioSignal),
            recycling,
            voice: None,
        })
    }
}

impl Recall for StreamSignal {
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

    fn run_init_post(&mut self, tick: &TickContext) {
        // the first buffer is consumed on the init tick too
        self.advance_streams(tick);
    }

    fn run_post(&mut self, tick: &TickContext) {
        self.advance_streams(tick);
    }
}

impl StreamSignal {
    fn advance_streams(&mut self, _tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        let recycling = self.recycling.lock().expect("recycling lock poisoned");
        for signal in recycling.signals() {
            let mut signal = match signal.lock() {
                Ok(signal) => signal,
                Err(_) => continue,
            };
            if signal.is_template() || signal.is_done() || !signal.belongs_to(&voice.recall_id) {
                continue;
            }
            if !signal.advance() && signal.is_fully_fed() {
                signal.set_done();
            }
        }
    }
}
