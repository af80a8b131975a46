//! Wave timeline playback and capture
//!
//! Playback streams the wave's granules into a per-voice signal,
//! anchored at the frame the voice started. Capture appends the master
//! bus into the wave timeline one granule per tick while the record
//! port is on - the exporter and overdub workflows both sit on top of
//! this.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::buffer::{copy_buffer_to_buffer, CopyMode};
use crate::engine::MasterRef;
use crate::graph::{Recycling, SignalRef};
use crate::timeline::Wave;
use crate::types::ChannelId;
use crate::voice::RecallId;

pub const RECORD_PORT: &str = "record";

/// Channel-run level wave playback
pub struct PlayWaveChannelRun {
    base: RecallBase,
    wave: Arc<Mutex<Wave>>,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
    signal: Option<SignalRef>,
    start_frame: u64,
}

impl PlayWaveChannelRun {
    pub fn template(
        channel: ChannelId,
        wave: Arc<Mutex<Wave>>,
        recycling: Arc<Mutex<Recycling>>,
    ) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("play-wave", RecallScope::ChannelRun)
                .with_channel(channel),
            wave,
            recycling,
            voice: None,
            signal: None,
            start_frame: 0,
        })
    }

    fn stream(&mut self, tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        if voice.expired.load(Ordering::Relaxed) {
            self.finish();
            return;
        }
        let Some(signal) = &self.signal else {
            return;
        };

        let position = tick.frame.saturating_sub(self.start_frame);
        let wave = self.wave.lock().expect("wave lock poisoned");

        let mut signal_locked = match signal.lock() {
            Ok(signal) => signal,
            Err(_) => return,
        };
        let Some(target) = signal_locked.current_buffer_mut() else {
            return;
        };
        target.clear();

        match wave.find_buffer(position) {
            Some(granule) => {
                let mode = CopyMode::new(target.format(), granule.format());
                let count = target.len().min(granule.len());
                copy_buffer_to_buffer(target, 0, granule, 0, count, mode);
            }
            None => {
                // ran past the recorded material: the stream is exhausted
                if position >= wave.frame_count() {
                    drop(signal_locked);
                    drop(wave);
                    self.finish();
                }
            }
        }
    }

    fn finish(&mut self) {
        if let Some(signal) = &self.signal {
            if let Ok(mut signal) = signal.lock() {
                signal.set_done();
            }
        }
        self.base.done();
    }
}

impl Recall for PlayWaveChannelRun {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            wave: Arc::clone(&self.wave),
            recycling: Arc::clone(&self.recycling),
            voice: Some(Arc::clone(voice)),
            signal: None,
            start_frame: 0,
        })
    }

    fn run_init_pre(&mut self, tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        self.start_frame = tick.frame;
        let mut recycling = self.recycling.lock().expect("recycling lock poisoned");
        let signal = recycling.create_signal();
        {
            let mut signal = signal.lock().expect("signal lock poisoned");
            signal.stream_resize(1);
            signal.set_recall_id(Arc::clone(&voice.recall_id));
        }
        self.signal = Some(signal);
    }

    fn run_init_inter(&mut self, tick: &TickContext) {
        self.stream(tick);
    }

    fn run_inter(&mut self, tick: &TickContext) {
        self.stream(tick);
    }
}

/// Audio-level wave capture of the master bus
pub struct CaptureWaveAudio {
    base: RecallBase,
    waves: Vec<Arc<Mutex<Wave>>>,
    master: MasterRef,
}

impl CaptureWaveAudio {
    pub fn template(
        waves: Vec<Arc<Mutex<Wave>>>,
        master: MasterRef,
    ) -> (Box<dyn Recall>, Arc<Port>) {
        let record = Port::new(RECORD_PORT, PortValue::Bool(false));
        let template = Box::new(Self {
            base: RecallBase::template("capture-wave", RecallScope::Audio)
                .with_ports(vec![Arc::clone(&record)]),
            waves,
            master,
        });
        (template, record)
    }

    fn capture(&mut self, tick: &TickContext) {
        let recording = self
            .base
            .port(RECORD_PORT)
            .map(|port| port.safe_read().as_bool())
            .unwrap_or(false);
        if !recording {
            return;
        }

        let master = self.master.lock().expect("master lock poisoned");
        for (audio_channel, wave) in self.waves.iter().enumerate() {
            let Some(buffer) = master.buffers().get(audio_channel) else {
                continue;
            };
            let mut wave = match wave.lock() {
                Ok(wave) => wave,
                Err(_) => continue,
            };
            wave.add_buffer(tick.frame, buffer.clone());
        }
    }
}

impl Recall for CaptureWaveAudio {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, _voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            waves: self.waves.clone(),
            master: Arc::clone(&self.master),
        })
    }

    fn run_init_post(&mut self, tick: &TickContext) {
        self.capture(tick);
    }

    fn run_post(&mut self, tick: &TickContext) {
        self.capture(tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::engine::gc::GcService;
    use crate::engine::MasterBus;
    use crate::recall::{stage_recall, test_tick, Stage};
    use crate::soundcard::SoundcardPresets;
    use crate::types::{AudioId, ChannelKind, SampleFormat, SoundScope};
    use crate::voice::RecyclingContext;

    #[test]
    fn test_playback_streams_granules_then_finishes() {
        let gc = GcService::new();
        let channel = ChannelId::new(AudioId(0), ChannelKind::Input, 0);
        let recycling = Arc::new(Mutex::new(Recycling::new(
            channel,
            SampleFormat::S16,
            48000,
            4,
            &gc.handle(),
        )));
        let wave = Arc::new(Mutex::new(Wave::new(48000, 4, SampleFormat::S16)));
        wave.lock()
            .unwrap()
            .add_buffer(0, AudioBuffer::S16(vec![11; 4].into_boxed_slice()));

        let id = RecallId::new(SoundScope::Wave, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        let template =
            PlayWaveChannelRun::template(channel, Arc::clone(&wave), Arc::clone(&recycling));
        let mut instance = template.duplicate(&id, &voice);

        let mut tick = test_tick(4);
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        {
            let recycling = recycling.lock().unwrap();
            let signal = recycling.signals()[0].lock().unwrap();
            assert_eq!(
                *signal.current_buffer().unwrap(),
                AudioBuffer::S16(vec![11; 4].into_boxed_slice())
            );
        }

        // past the recorded material the stream finishes naturally
        tick.frame = 8;
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        assert!(instance.base().flags().done);
        assert!(recycling.lock().unwrap().signals()[0].lock().unwrap().is_done());
    }

    #[test]
    fn test_capture_respects_record_port() {
        let master = MasterBus::new(SoundcardPresets {
            channels: 1,
            buffer_size: 4,
            format: SampleFormat::S16,
            ..SoundcardPresets::default()
        });
        master
            .lock()
            .unwrap()
            .mix(0, &AudioBuffer::S16(vec![42; 4].into_boxed_slice()));

        let wave = Arc::new(Mutex::new(Wave::new(48000, 4, SampleFormat::S16)));
        let (template, record) =
            CaptureWaveAudio::template(vec![Arc::clone(&wave)], Arc::clone(&master));
        let id = RecallId::new(SoundScope::Wave, RecyclingContext::new(1));
        let voice = VoiceContext::new(Arc::clone(&id), 0);
        let mut instance = template.duplicate(&id, &voice);

        let tick = test_tick(4);
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        assert!(wave.lock().unwrap().is_empty(), "record off captures nothing");

        record.safe_write(PortValue::Bool(true));
        for stage in Stage::ALL {
            stage_recall(instance.as_mut(), stage, &tick);
        }
        assert_eq!(wave.lock().unwrap().len(), 1);
        assert_eq!(
            *wave.lock().unwrap().find_buffer(0).unwrap(),
            AudioBuffer::S16(vec![42; 4].into_boxed_slice())
        );
    }
}
