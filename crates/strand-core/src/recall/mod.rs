//! The recall layer
//!
//! A recall is one instantiable unit of processing behavior. Templates
//! are inert and exist only to be cloned; when a voice starts, every
//! template of the audio is duplicated for the voice's recall id and the
//! clones run the staged callbacks once per tick:
//!
//! - first tick: `run_init_pre` / `run_init_inter` / `run_init_post`
//!   (allocate per-voice resources)
//! - every following tick: `run_pre` / `run_inter` / `run_post`
//!   (produce/consume one buffer period)
//!
//! The three phases form a strict barrier across all active recalls -
//! see [`crate::thread`] - so a recall may read its ports in `pre`,
//! stream samples in `inter` and publish/finish in `post` without
//! ordering races against siblings.

pub mod buffer_channel;
pub mod container;
pub mod copy_channel;
pub mod copy_pattern;
pub mod count_beats;
pub mod delay_audio;
pub mod factory;
pub mod peak_channel;
pub mod play_master;
pub mod play_notation;
pub mod play_wave;
pub mod plugin_bridge;
pub mod port;
pub mod stream_signal;
pub mod volume_channel;

pub use container::{ContainerId, RecallContainer, RecallSlot};
pub use port::{find_port, Port, PortValue};

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use crate::types::{ChannelId, SampleFormat};
use crate::voice::RecallId;

/// The five instantiation levels of a logical effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecallScope {
    Audio = 0,
    Channel = 1,
    ChannelRun = 2,
    Recycling = 3,
    AudioSignal = 4,
}

/// Lifecycle flags of a recall
///
/// Templates are never staged. `done` excludes a recall from staging
/// but keeps it around until the cleanup pass flags `remove` and
/// unlinks it. `persistent` recalls (tact/delay generators) are exempt
/// from the natural done transition and only finish on explicit cancel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecallFlags {
    pub template: bool,
    pub run_initialized: bool,
    pub done: bool,
    pub canceled: bool,
    pub remove: bool,
    pub persistent: bool,
}

/// Common state every recall carries
pub struct RecallBase {
    name: &'static str,
    scope: RecallScope,
    flags: RecallFlags,
    recall_id: Option<Arc<RecallId>>,
    /// Channel this recall is bound to, if channel-scoped
    channel: Option<ChannelId>,
    /// Destination channel for destination-dependent recalls
    destination: Option<ChannelId>,
    ports: Vec<Arc<Port>>,
    cancel_requested: bool,
}

impl RecallBase {
    /// A template base; `duplicate` clears the template flag
    pub fn template(name: &'static str, scope: RecallScope) -> Self {
        Self {
            name,
            scope,
            flags: RecallFlags {
                template: true,
                ..RecallFlags::default()
            },
            recall_id: None,
            channel: None,
            destination: None,
            ports: Vec::new(),
            cancel_requested: false,
        }
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_destination(mut self, destination: ChannelId) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_ports(mut self, ports: Vec<Arc<Port>>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_persistent(mut self) -> Self {
        self.flags.persistent = true;
        self
    }

    /// Instance base cloned from a template for one voice
    pub fn instantiate(&self, recall_id: &Arc<RecallId>) -> Self {
        Self {
            name: self.name,
            scope: self.scope,
            flags: RecallFlags {
                template: false,
                persistent: self.flags.persistent,
                ..RecallFlags::default()
            },
            recall_id: Some(Arc::clone(recall_id)),
            channel: self.channel,
            destination: self.destination,
            // ports are shared across the container's instances
            ports: self.ports.clone(),
            cancel_requested: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> RecallScope {
        self.scope
    }

    pub fn flags(&self) -> RecallFlags {
        self.flags
    }

    pub fn recall_id(&self) -> Option<&Arc<RecallId>> {
        self.recall_id.as_ref()
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    pub fn destination(&self) -> Option<ChannelId> {
        self.destination
    }

    pub fn ports(&self) -> &[Arc<Port>] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&Arc<Port>> {
        find_port(&self.ports, name)
    }

    /// Natural completion; persistent recalls ignore it
    pub fn done(&mut self) {
        if self.flags.persistent {
            return;
        }
        self.flags.done = true;
    }

    /// Completion that bypasses the persistent exemption
    ///
    /// Used when a fault (failed allocation, dead plugin) forces the
    /// recall out of the graph.
    pub fn force_done(&mut self) {
        self.flags.done = true;
        self.flags.remove = true;
    }

    /// Request cooperative cancellation
    ///
    /// Observed at the next `run_pre` boundary, so the buffer being
    /// produced this tick is never left half-written.
    pub fn cancel(&mut self) {
        self.cancel_requested = true;
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Flag for the cleanup pass
    pub fn mark_remove(&mut self) {
        self.flags.remove = true;
    }

    pub(crate) fn set_run_initialized(&mut self) {
        self.flags.run_initialized = true;
    }

    pub(crate) fn take_cancel(&mut self) {
        self.cancel_requested = false;
        self.flags.persistent = false;
        self.flags.canceled = true;
        self.flags.done = true;
    }
}

/// Read-only per-tick timing snapshot handed to every staged callback
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Transport position in sequencer steps
    pub note_offset: u64,
    /// Transport position ignoring the loop
    pub note_offset_absolute: u64,
    /// Buffer periods elapsed inside the current step
    pub delay_counter: f64,
    /// Buffer periods per step
    pub absolute_delay: f64,
    /// Phase offset of the step inside this buffer, in frames
    pub attack: usize,
    pub buffer_size: usize,
    pub samplerate: u32,
    pub format: SampleFormat,
    /// Soundcard frame count at the start of this tick
    pub frame: u64,
    /// Whether this tick is the first buffer period of a step
    pub step_begins: bool,
}

impl TickContext {
    /// Frames one sequencer step covers
    pub fn frames_per_step(&self) -> u64 {
        (self.absolute_delay * self.buffer_size as f64) as u64
    }
}

/// Per-voice shared state
///
/// The counting recall publishes the voice's sequencer position here;
/// sibling recalls of the same voice read it instead of wiring ad-hoc
/// callbacks between objects.
pub struct VoiceContext {
    pub recall_id: Arc<RecallId>,
    /// Position within the sequencer loop, maintained by count-beats
    pub sequencer_offset: AtomicU64,
    /// Set once the counting recall has wrapped past the loop end with
    /// looping disabled; pattern playback stops producing then
    pub expired: AtomicBool,
    /// Note offset of the transport when the voice started
    pub start_offset: u64,
}

impl VoiceContext {
    pub fn new(recall_id: Arc<RecallId>, start_offset: u64) -> Arc<Self> {
        Arc::new(Self {
            recall_id,
            sequencer_offset: AtomicU64::new(0),
            expired: AtomicBool::new(false),
            start_offset,
        })
    }
}

/// One staged unit of audio-processing behavior
pub trait Recall: Send {
    fn base(&self) -> &RecallBase;
    fn base_mut(&mut self) -> &mut RecallBase;

    /// Clone a template into a per-voice instance
    ///
    /// Copies configuration (ports, bindings) but never runtime buffers;
    /// those are allocated by the `run_init_*` stages on the first tick.
    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall>;

    fn run_init_pre(&mut self, _tick: &TickContext) {}
    fn run_init_inter(&mut self, _tick: &TickContext) {}
    fn run_init_post(&mut self, _tick: &TickContext) {}

    fn run_pre(&mut self, _tick: &TickContext) {}
    fn run_inter(&mut self, _tick: &TickContext) {}
    fn run_post(&mut self, _tick: &TickContext) {}
}

/// One barrier phase of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pre,
    Inter,
    Post,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Pre, Stage::Inter, Stage::Post];
}

/// Drive one recall through one stage of the current tick
///
/// Templates and done recalls are never staged. A pending cancel is
/// taken at the `pre` boundary. The first tick runs the init callbacks;
/// `run_initialized` flips after `init_post`.
pub fn stage_recall(recall: &mut dyn Recall, stage: Stage, tick: &TickContext) {
    let flags = recall.base().flags();
    if flags.template || flags.done {
        return;
    }

    if stage == Stage::Pre && recall.base().is_cancel_requested() {
        recall.base_mut().take_cancel();
        return;
    }

    if !flags.run_initialized {
        match stage {
            Stage::Pre => recall.run_init_pre(tick),
            Stage::Inter => recall.run_init_inter(tick),
            Stage::Post => {
                recall.run_init_post(tick);
                recall.base_mut().set_run_initialized();
            }
        }
    } else {
        match stage {
            Stage::Pre => recall.run_pre(tick),
            Stage::Inter => recall.run_inter(tick),
            Stage::Post => recall.run_post(tick),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_tick(buffer_size: usize) -> TickContext {
    TickContext {
        note_offset: 0,
        note_offset_absolute: 0,
        delay_counter: 0.0,
        absolute_delay: 4.0,
        attack: 0,
        buffer_size,
        samplerate: 48000,
        format: SampleFormat::S16,
        frame: 0,
        step_begins: true,
    }
}
