//! Feed across a link
//!
//! When an input channel is linked to another audio's output, this
//! recall pulls the upstream signals into the local recycling - the
//! sub-mix path of a machine chain. Upstream voices are matched through
//! their recycling context: the local voice accepts a signal whose
//! context is the same, or whose context hangs directly below it.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::{Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::buffer::{copy_buffer_to_buffer, CopyMode};
use crate::graph::{Recycling, SignalRef};
use crate::types::ChannelId;
use crate::voice::{RecallId, RecyclingContext};

/// Whether a signal's voice belongs in ours: same context, or a child
/// mixing into this bus
fn context_related(signal_id: &Arc<RecallId>, ours: &Arc<RecyclingContext>) -> bool {
    let context = signal_id.context();
    if Arc::ptr_eq(context, ours) {
        return true;
    }
    context
        .parent()
        .map(|parent| Arc::ptr_eq(parent, ours))
        .unwrap_or(false)
}

/// Channel-scoped bridge over a link
pub struct BufferChannel {
    base: RecallBase,
    /// Recyclings behind the linked output channel
    upstream: Vec<Arc<Mutex<Recycling>>>,
    /// The local channel's recycling
    local: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
    dest_signal: Option<SignalRef>,
}

impl BufferChannel {
    pub fn template(
        channel: ChannelId,
        upstream: Vec<Arc<Mutex<Recycling>>>,
        local: Arc<Mutex<Recycling>>,
    ) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("buffer-channel", RecallScope::Channel)
                .with_channel(channel),
            upstream,
            local,
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

        let ours = voice.recall_id.context();
        for recycling in &self.upstream {
            let recycling = match recycling.lock() {
                Ok(recycling) => recycling,
                Err(_) => continue,
            };
            for signal in recycling.signals() {
                let signal = match signal.lock() {
                    Ok(signal) => signal,
                    Err(_) => continue,
                };
                if signal.is_template() || signal.is_done() {
                    continue;
                }
                let related = signal
                    .recall_id()
                    .map(|id| context_related(id, ours))
                    .unwrap_or(false);
                if !related {
                    continue;
                }
                if let Some(buffer) = signal.current_buffer() {
                    let mode = CopyMode::new(dest_format, buffer.format());
                    let count = target.len().min(buffer.len());
                    copy_buffer_to_buffer(target, 0, buffer, 0, count, mode);
                }
            }
        }
    }
}

impl Recall for BufferChannel {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            upstream: self.upstream.clone(),
            local: Arc::clone(&self.local),
            voice: Some(Arc::clone(voice)),
            dest_signal: None,
        })
    }

    fn run_init_pre(&mut self, _tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        let mut local = self.local.lock().expect("local recycling lock poisoned");
        let signal = local.create_signal();
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
        if expired {
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

    fn recycling(gc: &GcService, audio: usize, line: usize) -> Arc<Mutex<Recycling>> {
        Arc::new(Mutex::new(Recycling::new(
            ChannelId::new(AudioId(audio), ChannelKind::Input, line),
            SampleFormat::S16,
            48000,
            4,
            &gc.handle(),
        )))
    }

    #[test]
    fn test_pulls_child_voice_signals_across_link() {
        let gc = GcService::new();
        let upstream = recycling(&gc, 0, 0);
        let local = recycling(&gc, 1, 0);

        // parent voice on the local audio, child voice upstream
        let parent_context = RecyclingContext::new(1);
        let parent_id = RecallId::new(SoundScope::Playback, Arc::clone(&parent_context));
        let child_context = RecyclingContext::with_parent(&parent_context, 1);
        let child_id = RecallId::new(SoundScope::Playback, child_context);
        let unrelated_id = RecallId::new(SoundScope::Playback, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&parent_id), 0);

        {
            let mut upstream = upstream.lock().unwrap();
            for (id, value) in [(&child_id, 200i16), (&unrelated_id, 7i16)] {
                let signal = upstream.create_signal();
                let mut signal = signal.lock().unwrap();
                signal.stream_resize(1);
                if let Some(AudioBuffer::S16(b)) = signal.buffer_at_mut(0) {
                    b.fill(value);
                }
                signal.set_recall_id(Arc::clone(id));
            }
        }

        let template = BufferChannel::template(
            ChannelId::new(AudioId(1), ChannelKind::Input, 0),
            vec![Arc::clone(&upstream)],
            Arc::clone(&local),
        );
        let mut instance = template.duplicate(&parent_id, &voice);
        let tick = test_tick(4);
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }

        let local = local.lock().unwrap();
        assert_eq!(local.signals().len(), 1);
        let dest = local.signals()[0].lock().unwrap();
        assert_eq!(
            *dest.current_buffer().unwrap(),
            AudioBuffer::S16(vec![200; 4].into_boxed_slice()),
            "only the related child voice is pulled"
        );
    }
}
