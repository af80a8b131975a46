//! External plugin bridge
//!
//! Hosts one plugin instance per voice and streams the voice's signal
//! buffers through it. The audio buffers handed to `run` are allocated
//! once at init and reused every tick. Any plugin fault retires this
//! recall (done + remove) instead of stalling the audio thread; the
//! channel then passes silence while the rest of the mix keeps playing.

use std::sync::{Arc, Mutex};

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::graph::Recycling;
use crate::plugin::{PluginHost, PluginInstance};
use crate::types::ChannelId;
use crate::voice::RecallId;

/// Channel-scoped plugin host bridge
pub struct PluginBridgeChannel {
    base: RecallBase,
    host: Arc<dyn PluginHost>,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
    instance: Option<Box<dyn PluginInstance>>,
    /// Reused every tick; the plugin sees stable buffers
    input_buffer: Vec<f32>,
    output_buffer: Vec<f32>,
    /// Control values read at the pre barrier
    controls: Vec<f32>,
}

impl PluginBridgeChannel {
    /// Template plus one shared port per plugin control
    pub fn template(
        channel: ChannelId,
        host: Arc<dyn PluginHost>,
        recycling: Arc<Mutex<Recycling>>,
    ) -> (Box<dyn Recall>, Vec<Arc<Port>>) {
        let ports: Vec<Arc<Port>> = host
            .descriptor()
            .controls
            .iter()
            .map(|control| Port::new(control.name.clone(), PortValue::Float(control.default as f64)))
            .collect();

        let template = Box::new(Self {
            base: RecallBase::template("plugin-bridge", RecallScope::Channel)
                .with_channel(channel)
                .with_ports(ports.clone()),
            host,
            recycling,
            voice: None,
            instance: None,
            input_buffer: Vec::new(),
            output_buffer: Vec::new(),
            controls: Vec::new(),
        });
        (template, ports)
    }

    fn read_controls(&mut self) {
        self.controls.clear();
        for port in self.base.ports() {
            self.controls.push(port.safe_read().as_float() as f32);
        }
    }

    fn process(&mut self) {
        let Some(voice) = self.voice.clone() else {
            return;
        };
        // take the handle out so a faulting plugin is simply not put back
        let Some(mut instance) = self.instance.take() else {
            return;
        };

        // push the latest control values before touching audio
        for (index, value) in self.controls.iter().enumerate() {
            if let Err(e) = instance.connect_control(index, *value) {
                log::error!("plugin-bridge: control update failed: {}", e);
                self.base.force_done();
                return;
            }
        }

        {
            let recycling = self.recycling.lock().expect("recycling lock poisoned");
            for signal in recycling.signals() {
                let mut signal = match signal.lock() {
                    Ok(signal) => signal,
                    Err(_) => continue,
                };
                if signal.is_template()
                    || signal.is_done()
                    || !signal.belongs_to(&voice.recall_id)
                {
                    continue;
                }
                let Some(buffer) = signal.current_buffer_mut() else {
                    continue;
                };

                buffer.copy_to_f32(&mut self.input_buffer);
                if let Err(e) = instance.run(&self.input_buffer, &mut self.output_buffer) {
                    log::error!("plugin-bridge: run failed, retiring recall: {}", e);
                    self.base.force_done();
                    return;
                }
                buffer.copy_from_f32(&self.output_buffer);
            }
        }

        self.instance = Some(instance);
    }
}

impl Recall for PluginBridgeChannel {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            host: Arc::clone(&self.host),
            recycling: Arc::clone(&self.recycling),
            voice: Some(Arc::clone(voice)),
            instance: None,
            input_buffer: Vec::new(),
            output_buffer: Vec::new(),
            controls: Vec::new(),
        })
    }

    fn run_init_pre(&mut self, tick: &TickContext) {
        match self.host.instantiate(tick.samplerate) {
            Ok(mut instance) => {
                instance.activate();
                self.instance = Some(instance);
                self.input_buffer = vec![0.0; tick.buffer_size];
                self.output_buffer = vec![0.0; tick.buffer_size];
                self.read_controls();
            }
            Err(e) => {
                // the channel degrades to pass-through silence; the rest
                // of the mix is unaffected
                log::error!(
                    "plugin-bridge: failed to instantiate '{}': {}",
                    self.host.descriptor().name,
                    e
                );
                self.base.force_done();
            }
        }
    }

    fn run_init_inter(&mut self, _tick: &TickContext) {
        self.process();
    }

    fn run_pre(&mut self, _tick: &TickContext) {
        self.read_controls();
    }

    fn run_inter(&mut self, _tick: &TickContext) {
        self.process();
    }
}

impl Drop for PluginBridgeChannel {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.as_mut() {
            instance.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::engine::gc::GcService;
    use crate::plugin::{
        PluginDescriptor, PluginError, PluginResult, PortDescriptor,
    };
    use crate::recall::{stage_recall, test_tick, Stage};
    use crate::types::{AudioId, ChannelKind, SampleFormat, SoundScope};
    use crate::voice::RecyclingContext;

    fn setup(
        host: Arc<dyn PluginHost>,
    ) -> (GcService, Arc<Mutex<Recycling>>, Box<dyn Recall>) {
        let gc = GcService::new();
        let channel = ChannelId::new(AudioId(0), ChannelKind::Input, 0);
        let recycling = Arc::new(Mutex::new(Recycling::new(
            channel,
            SampleFormat::Float,
            48000,
            4,
            &gc.handle(),
        )));
        let id = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        {
            let mut recycling = recycling.lock().unwrap();
            let signal = recycling.create_signal();
            let mut signal = signal.lock().unwrap();
            signal.stream_resize(1);
            if let Some(AudioBuffer::Float(b)) = signal.buffer_at_mut(0) {
                b.fill(0.5);
            }
            signal.set_recall_id(Arc::clone(&id));
        }

        let (template, _ports) =
            PluginBridgeChannel::template(channel, host, Arc::clone(&recycling));
        let instance = template.duplicate(&id, &voice);
        (gc, recycling, instance)
    }

    #[test]
    fn test_processes_signals_through_plugin() {
        let host = Arc::new(crate::plugin::native::GainHost::new());
        let (_gc, recycling, mut recall) = setup(host);

        let tick = test_tick(4);
        for stage in Stage::ALL {
            stage_recall(recall.as_mut(), stage, &tick);
        }

        // default gain of 1.0 leaves the samples intact
        let recycling = recycling.lock().unwrap();
        let signal = recycling.signals()[0].lock().unwrap();
        assert_eq!(
            *signal.current_buffer().unwrap(),
            AudioBuffer::Float(vec![0.5; 4].into_boxed_slice())
        );
        assert!(!recall.base().flags().done);
    }

    struct BrokenHost {
        descriptor: PluginDescriptor,
    }

    impl PluginHost for BrokenHost {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        fn instantiate(&self, _samplerate: u32) -> PluginResult<Box<dyn PluginInstance>> {
            Err(PluginError::Instantiate("missing binary".to_string()))
        }
    }

    #[test]
    fn test_failed_instantiation_retires_recall() {
        let host = Arc::new(BrokenHost {
            descriptor: PluginDescriptor {
                name: "broken".to_string(),
                maker: "test".to_string(),
                controls: vec![PortDescriptor::new("x", 0.0, 0.0, 1.0)],
            },
        });
        let (_gc, recycling, mut recall) = setup(host);

        let tick = test_tick(4);
        for stage in Stage::ALL {
            stage_recall(recall.as_mut(), stage, &tick);
        }

        let flags = recall.base().flags();
        assert!(flags.done && flags.remove);

        // the signal itself is untouched - pass-through, not garbage
        let recycling = recycling.lock().unwrap();
        let signal = recycling.signals()[0].lock().unwrap();
        assert_eq!(
            *signal.current_buffer().unwrap(),
            AudioBuffer::Float(vec![0.5; 4].into_boxed_slice())
        );
    }
}
