//! Input-to-output copy
//!
//! Streams one input channel's voice signals into an output channel's
//! recycling inside the same audio. One channel-run exists per
//! destination output channel; they share the container but route
//! independently.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::{Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::buffer::{copy_buffer_to_buffer, CopyMode};
use crate::graph::{Recycling, SignalRef};
use crate::types::ChannelId;
use crate::voice::RecallId;

/// Channel-level data: binds the source input channel
pub struct CopyChannel {
    base: RecallBase,
}

impl CopyChannel {
    pub fn template(channel: ChannelId) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("copy-channel", RecallScope::Channel)
                .with_channel(channel),
        })
    }
}

impl Recall for CopyChannel {
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

/// Channel-run level: one per destination output channel
pub struct CopyChannelRun {
    base: RecallBase,
    source: Arc<Mutex<Recycling>>,
    destination: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
    /// The pass-through signal this run owns on the destination
    dest_signal: Option<SignalRef>,
}

impl CopyChannelRun {
    pub fn template(
        channel: ChannelId,
        destination: ChannelId,
        source: Arc<Mutex<Recycling>>,
        destination_recycling: Arc<Mutex<Recycling>>,
    ) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("copy-channel-run", RecallScope::ChannelRun)
                .with_channel(channel)
                .with_destination(destination),
            source,
            destination: destination_recycling,
            voice: None,
            dest_signal: None,
        })
    }

    fn stream(&mut self) {
        let Some(voice) = &self.voice else {
            return;
        };
        let Some(dest) = &self.dest_signal else {
            return;
        };

        let mut dest = match dest.lock() {
            Ok(dest) => dest,
            Err(_) => return,
        };
        let dest_format = dest.format();
        let Some(target) = dest.current_buffer_mut() else {
            return;
        };
        target.clear();

        let source = self.source.lock().expect("source recycling lock poisoned");
        for signal in source.signals() {
            let signal = match signal.lock() {
                Ok(signal) => signal,
                Err(_) => continue,
            };
            if signal.is_template() || signal.is_done() || !signal.belongs_to(&voice.recall_id) {
                continue;
            }
            if let Some(buffer) = signal.current_buffer() {
                let mode = CopyMode::new(dest_format, buffer.format());
                let count = target.len().min(buffer.len());
                copy_buffer_to_buffer(target, 0, buffer, 0, count, mode);
            }
        }
    }

    fn source_is_drained(&self) -> bool {
        let Some(voice) = &self.voice else {
            return true;
        };
        self.source
            .lock()
            .map(|source| {
                !source.signals().iter().any(|signal| {
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
            .unwrap_or(true)
    }
}

impl Recall for CopyChannelRun {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            source: Arc::clone(&self.source),
            destination: Arc::clone(&self.destination),
            voice: Some(Arc::clone(voice)),
            dest_signal: None,
        })
    }

    fn run_init_pre(&mut self, _tick: &TickContext) {
        // allocate the per-voice pass-through signal
        let Some(voice) = &self.voice else {
            return;
        };
        let mut destination = self.destination.lock().expect("destination lock poisoned");
        let signal = destination.create_signal();
        {
            let mut signal = signal.lock().expect("signal lock poisoned");
            signal.stream_resize(1);
            signal.set_recall_id(Arc::clone(&voice.recall_id));
        }
        self.dest_signal = Some(signal);
    }

    fn run_init_inter(&mut self, _tick: &TickContext) {
        self.stream();
    }

    fn run_inter(&mut self, _tick: &TickContext) {
        self.stream();
    }

    fn run_post(&mut self, _tick: &TickContext) {
        let expired = self
            .voice
            .as_ref()
            .map(|voice| voice.expired.load(Ordering::Relaxed))
            .unwrap_or(false);
        if expired && self.source_is_drained() {
            if let Some(dest) = &self.dest_signal {
                if let Ok(mut dest) = dest.lock() {
                    dest.set_done();
                }
            }
            self.base.done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::engine::gc::GcService;
    use crate::recall::{stage_recall, test_tick, Stage};
    use crate::types::{AudioId, ChannelKind, SampleFormat, SoundScope};
    use crate::voice::RecyclingContext;

    #[test]
    fn test_copies_voice_signals_to_destination() {
        let gc = GcService::new();
        let input = ChannelId::new(AudioId(0), ChannelKind::Input, 0);
        let output = ChannelId::new(AudioId(0), ChannelKind::Output, 0);
        let source = Arc::new(Mutex::new(Recycling::new(
            input,
            SampleFormat::S16,
            48000,
            4,
            &gc.handle(),
        )));
        let destination = Arc::new(Mutex::new(Recycling::new(
            output,
            SampleFormat::S16,
            48000,
            4,
            &gc.handle(),
        )));

        let id = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        {
            let mut source = source.lock().unwrap();
            let signal = source.create_signal();
            let mut signal = signal.lock().unwrap();
            signal.stream_resize(1);
            if let Some(AudioBuffer::S16(b)) = signal.buffer_at_mut(0) {
                b.fill(300);
            }
            signal.set_recall_id(Arc::clone(&id));
        }

        let template = CopyChannelRun::template(
            input,
            output,
            Arc::clone(&source),
            Arc::clone(&destination),
        );
        assert_eq!(template.base().destination(), Some(output));

        let mut instance = template.duplicate(&id, &voice);
        let tick = test_tick(4);
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }

        let destination = destination.lock().unwrap();
        assert_eq!(destination.signals().len(), 1);
        let dest_signal = destination.signals()[0].lock().unwrap();
        assert!(dest_signal.belongs_to(&id));
        assert_eq!(
            *dest_signal.current_buffer().unwrap(),
            AudioBuffer::S16(vec![300; 4].into_boxed_slice())
        );
    }
}
