//! The engine
//!
//! Owns the audio graph, the template containers, the live voices and
//! the soundcard handle. Everything is dependency-injected at
//! construction - config, soundcard, plugin registry - and torn down
//! with the engine; there are no process-wide singletons.
//!
//! The engine runs on one thread (the audio loop). Control threads talk
//! to it exclusively through the task queue and read state back through
//! atomics and ports.

pub mod gc;
mod master;
mod voice_run;

pub use master::{MasterBus, MasterRef};
pub use voice_run::{VoiceRef, VoiceRun};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use gc::GcService;

use crate::buffer::{copy_buffer_to_buffer, CopyMode};
use crate::config::EngineConfig;
use crate::export::ExportWriter;
use crate::graph::{Audio, AudioFlags};
use crate::plugin::PluginRegistry;
use crate::recall::count_beats::SEQUENCER_LENGTH_PORT;
use crate::recall::delay_audio::TACT_PORT;
use crate::recall::factory;
use crate::recall::play_wave::RECORD_PORT;
use crate::recall::volume_channel::MUTED_PORT;
use crate::recall::{PortValue, TickContext, VoiceContext};
use crate::soundcard::{OfflineSoundcard, Soundcard, SoundcardPresets};
use crate::task::{task_channel, ReportReceiver, ReportSender, Task, TaskLauncher, TaskReport};
use crate::thread::{StageDispatcher, WorkerPool};
use crate::types::{AudioId, ChannelId, ChannelKind, SoundScope};
use crate::voice::{RecallId, RecyclingContext};

/// Lock-free engine state for control-thread reads
pub struct EngineAtomics {
    /// Transport position in sequencer steps
    pub note_offset: AtomicU64,
    /// Live voice count
    pub active_voices: AtomicUsize,
    /// Master peak of the last tick, in thousandths
    pub master_peak_milli: AtomicU64,
}

impl EngineAtomics {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            note_offset: AtomicU64::new(0),
            active_voices: AtomicUsize::new(0),
            master_peak_milli: AtomicU64::new(0),
        })
    }
}

/// Control-side handles returned by engine construction
pub struct EngineHandles {
    pub launcher: TaskLauncher,
    pub reports: ReportReceiver,
    pub atomics: Arc<EngineAtomics>,
}

pub struct Engine {
    presets: SoundcardPresets,
    soundcard: Box<dyn Soundcard>,
    master: MasterRef,
    gc: GcService,
    plugins: PluginRegistry,
    audios: Vec<Audio>,
    voices: Vec<VoiceRef>,
    dispatcher: StageDispatcher,
    tasks: rtrb::Consumer<Task>,
    reports: ReportSender,
    export: Option<ExportWriter>,
    pool: WorkerPool,
    atomics: Arc<EngineAtomics>,
}

impl Engine {
    /// Build an engine around an externally constructed soundcard
    pub fn new(config: &EngineConfig, mut soundcard: Box<dyn Soundcard>) -> (Self, EngineHandles) {
        soundcard.set_bpm(config.bpm);
        soundcard.set_delay_factor(config.delay_factor);
        let presets = soundcard.presets();

        let dispatcher = if config.super_threaded {
            StageDispatcher::super_threaded(config.channel_threads.max(1))
        } else {
            StageDispatcher::inline()
        };

        let (launcher, tasks) = task_channel();
        let (report_tx, report_rx) = crossbeam::channel::unbounded();
        let atomics = EngineAtomics::new();

        let engine = Self {
            presets,
            soundcard,
            master: MasterBus::new(presets),
            gc: GcService::new(),
            plugins: PluginRegistry::builtin(),
            audios: Vec::new(),
            voices: Vec::new(),
            dispatcher,
            tasks,
            reports: report_tx,
            export: None,
            pool: WorkerPool::new(config.worker_threads, 32),
            atomics: Arc::clone(&atomics),
        };
        let handles = EngineHandles {
            launcher,
            reports: report_rx,
            atomics,
        };

        log::info!(
            "engine up: {} ch @ {} Hz, {} frame periods, {}",
            presets.channels,
            presets.samplerate,
            presets.buffer_size,
            if engine.dispatcher.is_super_threaded() {
                "super-threaded"
            } else {
                "inline staging"
            }
        );
        (engine, handles)
    }

    /// Engine on the offline soundcard (tests, rendering)
    pub fn offline(config: &EngineConfig) -> (Self, EngineHandles) {
        let soundcard = Box::new(OfflineSoundcard::new(config.presets()));
        Self::new(config, soundcard)
    }

    pub fn presets(&self) -> SoundcardPresets {
        self.presets
    }

    pub fn master(&self) -> &MasterRef {
        &self.master
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    pub fn soundcard(&self) -> &dyn Soundcard {
        self.soundcard.as_ref()
    }

    pub fn soundcard_mut(&mut self) -> &mut dyn Soundcard {
        self.soundcard.as_mut()
    }

    pub fn atomics(&self) -> &Arc<EngineAtomics> {
        &self.atomics
    }

    // ── graph construction ──────────────────────────────────────────────

    pub fn add_audio(
        &mut self,
        name: impl Into<String>,
        flags: AudioFlags,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    ) -> AudioId {
        let id = AudioId(self.audios.len());
        self.audios.push(Audio::new(
            id,
            name,
            self.presets,
            flags,
            audio_channels,
            output_pads,
            input_pads,
            &self.gc.handle(),
        ));
        id
    }

    pub fn audio(&self, id: AudioId) -> Option<&Audio> {
        self.audios.get(id.0)
    }

    pub fn audio_mut(&mut self, id: AudioId) -> Option<&mut Audio> {
        self.audios.get_mut(id.0)
    }

    /// Map the recall templates an audio's timelines require
    pub fn map_recall(&mut self, id: AudioId, output_pad_start: usize) {
        let master = Arc::clone(&self.master);
        if let Some(audio) = self.audios.get_mut(id.0) {
            factory::map_recall(audio, output_pad_start, &master);
        }
    }

    /// Attach a registered plugin onto an input channel
    pub fn map_plugin(&mut self, id: AudioId, line: usize, plugin: &str) -> bool {
        let Some(host) = self.plugins.find(plugin).map(Arc::clone) else {
            log::warn!("plugin '{}' not registered", plugin);
            return false;
        };
        if let Some(audio) = self.audios.get_mut(id.0) {
            factory::map_plugin(audio, line, host);
            true
        } else {
            false
        }
    }

    // ── voices ──────────────────────────────────────────────────────────

    /// Start one voice on an audio
    ///
    /// Builds the recycling context from the current topology, attaches
    /// the recall id and duplicates every template container top-down.
    pub fn start_audio(&mut self, id: AudioId, scope: SoundScope) -> Result<(), String> {
        let Some(audio) = self.audios.get(id.0) else {
            return Err(format!("no audio {:?}", id));
        };
        if audio.containers().is_empty() {
            return Err(format!("audio {:?} has no recalls mapped", id));
        }

        let inputs: Vec<ChannelId> = audio
            .channels(ChannelKind::Input)
            .iter()
            .filter(|channel| channel.recycling().is_some())
            .map(|channel| channel.id())
            .collect();
        let context = RecyclingContext::new(inputs.len());
        for (position, channel) in inputs.iter().enumerate() {
            context.replace(*channel, position);
        }

        let recall_id = RecallId::new(scope, context);
        let voice = VoiceContext::new(Arc::clone(&recall_id), self.soundcard.note_offset());

        let mut slots = Vec::new();
        for container in audio.containers() {
            slots.extend(container.duplicate_for(&recall_id, &voice));
        }

        log::info!(
            "voice {} started on {:?} in {} scope ({} recalls)",
            recall_id.serial(),
            id,
            scope.name(),
            slots.len()
        );
        self.audios[id.0].attach_recall_id(Arc::clone(&recall_id));
        self.voices.push(VoiceRun::new(recall_id, voice, id, slots));
        self.atomics
            .active_voices
            .store(self.voices.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Request cooperative cancellation of an audio's voices in a scope
    pub fn cancel_audio(&mut self, id: AudioId, scope: SoundScope) {
        let mut cancelled = 0;
        for voice in &self.voices {
            let Ok(mut voice) = voice.lock() else {
                continue;
            };
            if voice.audio() == id && voice.scope() == scope {
                voice.cancel();
                cancelled += 1;
            }
        }
        log::info!(
            "cancel requested for {} voice(s) on {:?} in {} scope",
            cancelled,
            id,
            scope.name()
        );
    }

    /// Link an output channel to another audio's input channel
    pub fn link_channel(&mut self, output: ChannelId, input: ChannelId) -> Result<(), String> {
        if output.kind != ChannelKind::Output || input.kind != ChannelKind::Input {
            return Err("link must go output -> input".to_string());
        }
        if output.audio == input.audio {
            return Err("cannot link an audio to itself".to_string());
        }
        if self
            .audios
            .get(output.audio.0)
            .and_then(|audio| audio.channel(ChannelKind::Output, output.line))
            .is_none()
        {
            return Err(format!("no such output channel {:?}", output));
        }
        if self
            .audios
            .get(input.audio.0)
            .and_then(|audio| audio.channel(ChannelKind::Input, input.line))
            .is_none()
        {
            return Err(format!("no such input channel {:?}", input));
        }

        let upstream = factory::recyclings_for_output(&self.audios[output.audio.0], output.line);

        if let Some(channel) = self.audios[output.audio.0].channel_mut(ChannelKind::Output, output.line)
        {
            channel.set_link(Some(input));
        }
        if let Some(channel) = self.audios[input.audio.0].channel_mut(ChannelKind::Input, input.line)
        {
            channel.set_link(Some(output));
        }
        factory::map_buffer_recall(&mut self.audios[input.audio.0], input.line, upstream);
        log::info!("linked {:?} -> {:?}", output, input);
        Ok(())
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[VoiceRef] {
        &self.voices
    }

    // ── export ──────────────────────────────────────────────────────────

    pub fn attach_export(&mut self, writer: ExportWriter) {
        self.export = Some(writer);
    }

    pub fn is_exporting(&self) -> bool {
        self.export.is_some()
    }

    // ── the tick ────────────────────────────────────────────────────────

    fn tick_context(&self) -> TickContext {
        let delay_counter = self.soundcard.delay_counter();
        TickContext {
            note_offset: self.soundcard.note_offset(),
            note_offset_absolute: self.soundcard.note_offset_absolute(),
            delay_counter,
            absolute_delay: self.soundcard.absolute_delay(),
            attack: self.soundcard.attack(),
            buffer_size: self.presets.buffer_size,
            samplerate: self.presets.samplerate,
            format: self.presets.format,
            frame: self.soundcard.frame_count(),
            step_begins: delay_counter == 0.0,
        }
    }

    /// Drain and apply queued tasks; runs between ticks only
    pub fn process_tasks(&mut self) {
        while let Ok(task) = self.tasks.pop() {
            let name = task.name();
            let result = self.execute(task);
            if let Err(e) = &result {
                log::warn!("task {} failed: {}", name, e);
            }
            let _ = self.reports.send(TaskReport { task: name, result });
        }
    }

    fn execute(&mut self, task: Task) -> Result<(), String> {
        match task {
            Task::StartAudio { audio, scope } => self.start_audio(audio, scope),
            Task::CancelAudio { audio, scope } => {
                self.cancel_audio(audio, scope);
                Ok(())
            }
            Task::ResizeAudio {
                audio,
                audio_channels,
                output_pads,
                input_pads,
            } => {
                let gc = self.gc.handle();
                let master = Arc::clone(&self.master);
                let Some(node) = self.audios.get_mut(audio.0) else {
                    return Err(format!("no audio {:?}", audio));
                };
                let old_output_pads = node.output_pads();
                node.resize_audio_channels(audio_channels, &gc);
                node.resize_pads(ChannelKind::Output, output_pads, &gc);
                node.resize_pads(ChannelKind::Input, input_pads, &gc);
                // new channels get their templates; live voices keep
                // draining on the topology they started with
                factory::map_recall(node, old_output_pads.min(output_pads), &master);
                Ok(())
            }
            Task::LinkChannel { output, input } => self.link_channel(output, input),
            Task::ApplyTact { audio, tact } => self
                .audios
                .get(audio.0)
                .and_then(|node| node.container("delay"))
                .and_then(|container| container.port(TACT_PORT))
                .map(|port| port.safe_write(PortValue::Float(tact.max(f64::MIN_POSITIVE))))
                .ok_or_else(|| format!("no delay recall on {:?}", audio)),
            Task::ApplySequencerLength { audio, length } => {
                let Some(node) = self.audios.get_mut(audio.0) else {
                    return Err(format!("no audio {:?}", audio));
                };
                node.set_sequencer_length(length);
                node.container("count-beats")
                    .and_then(|container| container.port(SEQUENCER_LENGTH_PORT))
                    .map(|port| port.safe_write(PortValue::UInt(length.max(1))))
                    .ok_or_else(|| format!("no count-beats recall on {:?}", audio))
            }
            Task::TogglePatternBit {
                channel,
                bank_0,
                bank_1,
                bit,
            } => self
                .audios
                .get(channel.audio.0)
                .and_then(|node| node.channel(ChannelKind::Input, channel.line))
                .and_then(|c| c.pattern())
                .map(|pattern| {
                    pattern
                        .lock()
                        .expect("pattern lock poisoned")
                        .toggle_bit(bank_0, bank_1, bit)
                })
                .ok_or_else(|| format!("no pattern on {:?}", channel)),
            Task::SetMuted { channel, muted } => self
                .audios
                .get(channel.audio.0)
                .and_then(|node| node.container_for_channel("volume", channel))
                .and_then(|container| container.port(MUTED_PORT))
                .map(|port| port.safe_write(PortValue::Bool(muted)))
                .ok_or_else(|| format!("no volume recall on {:?}", channel)),
            Task::SetBpm { bpm } => {
                self.soundcard.set_bpm(bpm);
                Ok(())
            }
            Task::SetLoop { bounds } => {
                self.soundcard.set_loop_bounds(bounds);
                Ok(())
            }
            Task::SetRecord { audio, enabled } => self
                .audios
                .get(audio.0)
                .and_then(|node| node.container("capture-wave"))
                .and_then(|container| container.port(RECORD_PORT))
                .map(|port| port.safe_write(PortValue::Bool(enabled)))
                .ok_or_else(|| format!("no capture-wave recall on {:?}", audio)),
            Task::ExportOutput { path, frames } => {
                ExportWriter::create(&path, self.presets, frames)
                    .map(|writer| self.export = Some(writer))
                    .map_err(|e| e.to_string())
            }
        }
    }

    /// One buffer period: staging, master hand-off, cleanup, tic
    pub fn tick(&mut self) {
        let tick = self.tick_context();
        self.dispatcher.run_tick(&self.voices, &tick);

        {
            let mut master = self.master.lock().expect("master lock poisoned");

            // master -> soundcard application buffer
            let app = self.soundcard.buffer_mut();
            for (channel, buffer) in app.iter_mut().enumerate() {
                if let Some(source) = master.buffers().get(channel) {
                    let mode = CopyMode::new(buffer.format(), source.format());
                    let count = buffer.len().min(source.len());
                    copy_buffer_to_buffer(buffer, 0, source, 0, count, mode);
                }
            }

            // export feed
            if let Some(export) = &mut self.export {
                if export.write_tick(&master) {
                    if let Some(writer) = export.take_writer() {
                        let reports = self.reports.clone();
                        self.pool.execute(move || {
                            let result = writer.finalize().map_err(|e| e.to_string());
                            if let Err(e) = &result {
                                log::error!("export finalize failed: {}", e);
                            }
                            let _ = reports.send(TaskReport {
                                task: "export-output",
                                result,
                            });
                        });
                    }
                    self.export = None;
                    log::info!("export complete");
                }
            }

            self.atomics
                .master_peak_milli
                .store((master.peak() * 1000.0) as u64, Ordering::Relaxed);
            master.clear();
        }

        self.cleanup();
        self.soundcard.tic();
        self.atomics
            .note_offset
            .store(self.soundcard.note_offset(), Ordering::Relaxed);
    }

    /// Drop finished voices and done signals; runs between ticks
    fn cleanup(&mut self) {
        // an expired voice drains its remaining housekeeping recalls
        // (persistent clock, data levels) through the cancel path; the
        // producing recalls have already gone done on their own
        for voice in &self.voices {
            if let Ok(mut voice) = voice.lock() {
                if voice
                    .voice()
                    .expired
                    .load(std::sync::atomic::Ordering::Relaxed)
                {
                    voice.cancel();
                }
            }
        }

        let mut finished: Vec<(AudioId, Arc<RecallId>)> = Vec::new();
        self.voices.retain(|voice| {
            let Ok(mut voice) = voice.lock() else {
                return false;
            };
            if voice.is_done() {
                voice.mark_removed();
                finished.push((voice.audio(), Arc::clone(voice.recall_id())));
                false
            } else {
                true
            }
        });
        for (audio, recall_id) in finished {
            log::info!("voice {} finished on {:?}", recall_id.serial(), audio);
            if let Some(node) = self.audios.get_mut(audio.0) {
                node.detach_recall_id(&recall_id);
            }
        }

        for audio in &mut self.audios {
            let live: Vec<Arc<RecallId>> = audio.recall_ids().to_vec();
            for kind in [ChannelKind::Output, ChannelKind::Input] {
                for channel in audio.channels_mut(kind) {
                    if let Some(recycling) = channel.recycling() {
                        recycling
                            .lock()
                            .expect("recycling lock poisoned")
                            .remove_finished(&live);
                    }
                }
            }
        }

        self.atomics
            .active_voices
            .store(self.voices.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AudioBuffer;
    use crate::recall::count_beats::LOOP_PORT;
    use crate::types::SampleFormat;

    fn small_config() -> EngineConfig {
        EngineConfig {
            buffer_size: 16,
            channels: 2,
            format: SampleFormat::S16,
            ..EngineConfig::default()
        }
    }

    fn pattern_flags() -> AudioFlags {
        AudioFlags {
            input_has_recycling: true,
            r#async: true,
            ..AudioFlags::default()
        }
    }

    /// Engine with one mapped 2x2 pattern machine, template filled with
    /// a constant so triggered steps are audible on the master
    fn pattern_engine() -> (Engine, EngineHandles, AudioId) {
        let (mut engine, handles) = Engine::offline(&small_config());
        let id = engine.add_audio("drums", pattern_flags(), 2, 2, 1);
        {
            let audio = engine.audio_mut(id).unwrap();
            for channel in audio.channels_mut(ChannelKind::Input) {
                channel.set_pattern(crate::timeline::Pattern::new(1, 1, 4));
                let recycling = channel.recycling().unwrap();
                let recycling = recycling.lock().unwrap();
                let mut template = recycling.template().lock().unwrap();
                template.stream_resize(1);
                if let Some(AudioBuffer::S16(b)) = template.buffer_at_mut(0) {
                    b.fill(1000);
                }
            }
        }
        engine.map_recall(id, 0);
        (engine, handles, id)
    }

    fn set_pattern_bit(engine: &mut Engine, id: AudioId, line: usize, bit: usize) {
        let audio = engine.audio(id).unwrap();
        let pattern = audio
            .channel(ChannelKind::Input, line)
            .unwrap()
            .pattern()
            .unwrap();
        pattern.lock().unwrap().set_bit(0, 0, bit, true);
    }

    /// Run whole sequencer steps (ticks until the next step boundary)
    fn run_steps(engine: &mut Engine, steps: usize) {
        for _ in 0..steps {
            loop {
                engine.process_tasks();
                engine.tick();
                if engine.soundcard().delay_counter() == 0.0 {
                    break;
                }
            }
        }
    }

    #[test]
    fn test_pattern_note_lifecycle() {
        let (mut engine, handles, id) = pattern_engine();
        set_pattern_bit(&mut engine, id, 0, 0);

        // finite sequence: 4 steps, no loop
        engine
            .execute(Task::ApplySequencerLength {
                audio: id,
                length: 4,
            })
            .unwrap();
        engine
            .audio(id)
            .unwrap()
            .container("count-beats")
            .unwrap()
            .port(LOOP_PORT)
            .unwrap()
            .safe_write(PortValue::Bool(false));

        engine.start_audio(id, SoundScope::Sequencer).unwrap();
        assert_eq!(engine.active_voices(), 1);
        assert_eq!(handles.atomics.active_voices.load(Ordering::Relaxed), 1);

        // the first tick mixes the triggered step onto the master
        engine.tick();
        assert!(
            handles.atomics.master_peak_milli.load(Ordering::Relaxed) > 0,
            "triggered step must be audible"
        );

        // a silent step later, the one-shot has drained
        run_steps(&mut engine, 2);
        let audio = engine.audio(id).unwrap();
        let recycling = audio
            .channel(ChannelKind::Input, 0)
            .unwrap()
            .recycling()
            .unwrap();
        assert!(
            recycling.lock().unwrap().signals().is_empty(),
            "done signal removed by cleanup"
        );

        // past the sequence end the voice expires and is removed
        run_steps(&mut engine, 6);
        assert_eq!(engine.active_voices(), 0);
        assert!(engine.audio(id).unwrap().recall_ids().is_empty());
    }

    #[test]
    fn test_voice_isolation_between_concurrent_voices() {
        let (mut engine, _handles, id) = pattern_engine();
        set_pattern_bit(&mut engine, id, 0, 0);

        engine.start_audio(id, SoundScope::Sequencer).unwrap();
        engine.start_audio(id, SoundScope::Playback).unwrap();
        assert_eq!(engine.active_voices(), 2);

        let contexts: Vec<_> = engine
            .audio(id)
            .unwrap()
            .recall_ids()
            .iter()
            .map(|recall_id| Arc::clone(recall_id.context()))
            .collect();
        assert_eq!(contexts.len(), 2);
        assert!(
            !Arc::ptr_eq(&contexts[0], &contexts[1]),
            "concurrent voices never share a recycling context"
        );

        engine.tick();

        // cancel one scope; the other voice's signals survive
        engine.cancel_audio(id, SoundScope::Playback);
        engine.process_tasks();
        engine.tick();
        engine.tick();
        assert_eq!(engine.active_voices(), 1);

        let audio = engine.audio(id).unwrap();
        let recycling = audio
            .channel(ChannelKind::Input, 0)
            .unwrap()
            .recycling()
            .unwrap();
        let survivor = engine.voices()[0].lock().unwrap();
        let recycling = recycling.lock().unwrap();
        for signal in recycling.signals() {
            let signal = signal.lock().unwrap();
            assert!(signal.belongs_to(survivor.recall_id()));
        }
    }

    #[test]
    fn test_cooperative_cancel_never_leaves_partial_buffers() {
        let (mut engine, handles, id) = pattern_engine();
        // every step triggers
        for bit in 0..4 {
            set_pattern_bit(&mut engine, id, 0, bit);
            set_pattern_bit(&mut engine, id, 1, bit);
        }
        engine.start_audio(id, SoundScope::Sequencer).unwrap();
        engine.tick();

        engine.cancel_audio(id, SoundScope::Sequencer);
        // cancel lands at the next pre boundary: that tick produces
        // nothing new, and no half-written buffer reaches the master
        engine.tick();
        assert_eq!(
            handles.atomics.master_peak_milli.load(Ordering::Relaxed),
            0,
            "post-cancel tick is fully silent, not partially written"
        );
        engine.tick();
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_resize_keeps_active_voice_context() {
        let (mut engine, _handles, id) = pattern_engine();
        set_pattern_bit(&mut engine, id, 0, 0);
        engine.start_audio(id, SoundScope::Sequencer).unwrap();
        engine.tick();

        let old_context = Arc::clone(engine.voices()[0].lock().unwrap().recall_id().context());
        let old_slots = engine.voices()[0].lock().unwrap().slots().len();

        // grow both sides while the voice plays
        engine
            .execute(Task::ResizeAudio {
                audio: id,
                audio_channels: 2,
                output_pads: 4,
                input_pads: 2,
            })
            .unwrap();

        // the active voice still references the pre-resize context
        let voice = engine.voices()[0].lock().unwrap();
        assert!(Arc::ptr_eq(voice.recall_id().context(), &old_context));
        assert_eq!(voice.slots().len(), old_slots);
        drop(voice);

        engine.tick();

        // a voice started after the resize sees the grown topology
        engine.start_audio(id, SoundScope::Playback).unwrap();
        let new_voice = engine.voices()[1].lock().unwrap();
        assert!(
            new_voice.slots().len() > old_slots,
            "new voice picks up templates mapped for the new channels"
        );
        assert_eq!(new_voice.recall_id().context().child_count(), 4);
    }

    #[test]
    fn test_task_queue_reports() {
        let (mut engine, mut handles, id) = pattern_engine();
        handles
            .launcher
            .launch(Task::SetBpm { bpm: 160.0 })
            .unwrap();
        handles
            .launcher
            .launch(Task::ApplyTact {
                audio: id,
                tact: 2.0,
            })
            .unwrap();
        handles
            .launcher
            .launch(Task::ApplyTact {
                audio: AudioId(99),
                tact: 2.0,
            })
            .unwrap();

        engine.process_tasks();

        assert_eq!(engine.soundcard().bpm(), 160.0);
        let reports: Vec<TaskReport> = handles.reports.try_iter().collect();
        assert_eq!(reports.len(), 3);
        assert!(reports[0].result.is_ok());
        assert!(reports[1].result.is_ok());
        assert!(reports[2].result.is_err(), "unknown audio surfaces an error");
    }

    #[test]
    fn test_apply_tact_reaches_shared_port() {
        let (mut engine, _handles, id) = pattern_engine();
        engine
            .execute(Task::ApplyTact {
                audio: id,
                tact: 0.5,
            })
            .unwrap();
        let tact = engine
            .audio(id)
            .unwrap()
            .container("delay")
            .unwrap()
            .port(TACT_PORT)
            .unwrap()
            .safe_read()
            .as_float();
        assert_eq!(tact, 0.5);
    }
}
