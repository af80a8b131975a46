//! Port-controlled gain
//!
//! Reads its ports once per tick in `run_pre` and applies the factor to
//! the voice's signal buffers in `run_inter`, before the playback
//! recalls mix them. A control thread may rewrite the ports at any
//! time; the per-port lock makes the read safe mid-tick.

use std::sync::{Arc, Mutex};

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::graph::Recycling;
use crate::types::ChannelId;
use crate::voice::RecallId;

pub const VOLUME_PORT: &str = "volume";
pub const MUTED_PORT: &str = "muted";

/// Channel-level data plus the shared ports
pub struct VolumeChannel {
    base: RecallBase,
}

impl VolumeChannel {
    pub fn template(channel: ChannelId, ports: Vec<Arc<Port>>) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("volume-channel", RecallScope::Channel)
                .with_channel(channel)
                .with_ports(ports),
        })
    }

    pub fn make_ports() -> Vec<Arc<Port>> {
        vec![
            Port::new(VOLUME_PORT, PortValue::Float(1.0)),
            Port::new(MUTED_PORT, PortValue::Bool(false)),
        ]
    }
}

impl Recall for VolumeChannel {
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

/// Audio-signal level: scales the current buffers
pub struct VolumeSignal {
    base: RecallBase,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
    /// Factor read from the ports at the pre barrier
    factor: f64,
}

impl VolumeSignal {
    pub fn template(recycling: Arc<Mutex<Recycling>>, ports: Vec<Arc<Port>>) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("volume-signal", RecallScope::AudioSignal)
                .with_ports(ports),
            recycling,
            voice: None,
            factor: 1.0,
        })
    }

    fn read_factor(&mut self) {
        let muted = self
            .base
            .port(MUTED_PORT)
            .map(|port| port.safe_read().as_bool())
            .unwrap_or(false);
        self.factor = if muted {
            0.0
        } else {
            self.base
                .port(VOLUME_PORT)
                .map(|port| port.safe_read().as_float())
                .unwrap_or(1.0)
        };
    }

    fn apply(&mut self) {
        let Some(voice) = &self.voice else {
            return;
        };
        if (self.factor - 1.0).abs() < f64::EPSILON {
            return;
        }
        let recycling = self.recycling.lock().expect("recycling lock poisoned");
        for signal in recycling.signals() {
            let mut signal = match signal.lock() {
                Ok(signal) => signal,
                Err(_) => continue,
            };
            if signal.is_template() || signal.is_done() || !signal.belongs_to(&voice.recall_id) {
                continue;
            }
            let factor = self.factor;
            if let Some(buffer) = signal.current_buffer_mut() {
                buffer.scale(factor);
            }
        }
    }
}

impl Recall for VolumeSignal {
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
            factor: 1.0,
        })
    }

    fn run_init_pre(&mut self, _tick: &TickContext) {
        self.read_factor();
    }

    fn run_init_inter(&mut self, _tick: &TickContext) {
        self.apply();
    }

    fn run_pre(&mut self, _tick: &TickContext) {
        self.read_factor();
    }

    fn run_inter(&mut self, _tick: &TickContext) {
        self.apply();
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
    fn test_volume_and_mute() {
        let gc = GcService::new();
        let channel = ChannelId::new(AudioId(0), ChannelKind::Input, 0);
        let recycling = Arc::new(Mutex::new(Recycling::new(
            channel,
            SampleFormat::S16,
            48000,
            4,
            &gc.handle(),
        )));

        let id = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        let signal = {
            let mut recycling = recycling.lock().unwrap();
            let signal = recycling.create_signal();
            let mut locked = signal.lock().unwrap();
            locked.stream_resize(1);
            if let Some(AudioBuffer::S16(b)) = locked.buffer_at_mut(0) {
                b.fill(1000);
            }
            locked.set_recall_id(Arc::clone(&id));
            drop(locked);
            signal
        };

        let ports = VolumeChannel::make_ports();
        let template = VolumeSignal::template(Arc::clone(&recycling), ports.clone());
        let mut instance = template.duplicate(&id, &voice);
        let tick = test_tick(4);

        // full volume leaves samples untouched
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        assert_eq!(
            *signal.lock().unwrap().current_buffer().unwrap(),
            AudioBuffer::S16(vec![1000; 4].into_boxed_slice())
        );

        // half volume scales the next buffer period
        super::super::find_port(&ports, VOLUME_PORT)
            .unwrap()
            .safe_write(PortValue::Float(0.5));
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        assert_eq!(
            *signal.lock().unwrap().current_buffer().unwrap(),
            AudioBuffer::S16(vec![500; 4].into_boxed_slice())
        );

        // mute wins over volume
        super::super::find_port(&ports, MUTED_PORT)
            .unwrap()
            .safe_write(PortValue::Bool(true));
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        assert_eq!(
            *signal.lock().unwrap().current_buffer().unwrap(),
            AudioBuffer::silence(SampleFormat::S16, 4)
        );
    }
}
