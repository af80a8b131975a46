//! Master playback
//!
//! Mixes every live signal a channel sees into the master bus. An
//! output channel without its own recycling plays the recyclings of the
//! input channels on its audio channel - the pass-through rule of the
//! signal chain.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::{Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::engine::MasterRef;
use crate::graph::Recycling;
use crate::types::ChannelId;
use crate::voice::RecallId;

/// Audio-level data of the play chain
pub struct PlayAudio {
    base: RecallBase,
}

impl PlayAudio {
    pub fn template() -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-audio", RecallScope::Audio),
        })
    }
}

impl Recall for PlayAudio {
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

/// Channel-level data: binds one output channel
pub struct PlayChannel {
    base: RecallBase,
}

impl PlayChannel {
    pub fn template(channel: ChannelId) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-channel", RecallScope::Channel)
                .with_channel(channel),
        })
    }
}

impl Recall for PlayChannel {
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

/// Channel-run level: the actual mix into the master bus
pub struct PlayChannelRun {
    base: RecallBase,
    /// Recyclings this output line plays (own, or pass-through inputs)
    sources: Vec<Arc<Mutex<Recycling>>>,
    master: MasterRef,
    audio_channel: usize,
    voice: Option<Arc<VoiceContext>>,
}

impl PlayChannelRun {
    pub fn template(
        channel: ChannelId,
        audio_channel: usize,
        sources: Vec<Arc<Mutex<Recycling>>>,
        master: MasterRef,
    ) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-channel-run", RecallScope::ChannelRun)
                .with_channel(channel),
            sources,
            master,
            audio_channel,
            voice: None,
        })
    }

    fn mix(&mut self) {
        let Some(voice) = &self.voice else {
            return;
        };
        let mut master = self.master.lock().expect("master lock poisoned");

        for recycling in &self.sources {
            let recycling = match recycling.lock() {
                Ok(recycling) => recycling,
                Err(_) => continue,
            };
            for signal in recycling.signals() {
                let signal = match signal.lock() {
                    Ok(signal) => signal,
                    Err(_) => continue,
                };
                if signal.is_template()
                    || signal.is_done()
                    || !signal.belongs_to(&voice.recall_id)
                {
                    continue;
                }
                if let Some(buffer) = signal.current_buffer() {
                    master.mix(self.audio_channel, buffer);
                }
            }
        }
    }

    /// Whether any live signal of this voice remains
    fn has_live_signals(&self) -> bool {
        let Some(voice) = &self.voice else {
            return false;
        };
        self.sources.iter().any(|recycling| {
            recycling
                .lock()
                .map(|recycling| {
                    recycling.signals().iter().any(|signal| {
                        signal
                            .lock()
                            .map(|signal| {
                                !signal.is_template()
                                    && !signal.is_done()
                                    && signal.belongs_to(&voice.recall_id)
                            })
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false)
        })
    }
}

impl Recall for PlayChannelRun {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            sources: self.sources.clone(),
            master: Arc::clone(&self.master),
            audio_channel: self.audio_channel,
            voice: Some(Arc::clone(voice)),
        })
    }

    fn run_init_inter(&mut self, _tick: &TickContext) {
        self.mix();
    }

    fn run_inter(&mut self, _tick: &TickContext) {
        self.mix();
    }

    fn run_post(&mut self, _tick: &TickContext) {
        let expired = self
            .voice
            .as_ref()
            .map(|voice| voice.expired.load(Ordering::Relaxed))
            .unwrap_or(false);
        if expired && !self.has_live_signals() {
            self.base.done();
        }
    }
}
