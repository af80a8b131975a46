//! Task queue - atomic graph mutations
//!
//! The control side never touches the graph directly: it pushes tasks
//! into a lock-free queue and the engine thread applies them between
//! ticks, before the next staged pass starts. That single-writer window
//! is what lets the real-time path run without a graph lock.
//!
//! Launching is fire-and-forget; outcomes surface on a report channel
//! the issuer can poll or subscribe to.

use std::path::PathBuf;

use crate::types::{AudioId, ChannelId, SoundScope};

/// Queue capacity in tasks
pub const TASK_QUEUE_CAPACITY: usize = 256;

/// One queued mutation, applied at the next tick boundary
#[derive(Debug)]
pub enum Task {
    /// Begin a new voice on an audio in the given scope
    StartAudio { audio: AudioId, scope: SoundScope },
    /// Cooperatively cancel every voice of an audio in the given scope
    CancelAudio { audio: AudioId, scope: SoundScope },
    /// Change channel/pad counts; active voices drain on the old topology
    ResizeAudio {
        audio: AudioId,
        audio_channels: usize,
        output_pads: usize,
        input_pads: usize,
    },
    /// Link an output channel to another audio's input channel
    LinkChannel {
        output: ChannelId,
        input: ChannelId,
    },
    /// Re-compute an audio's step stretch while it plays
    ApplyTact { audio: AudioId, tact: f64 },
    /// Change the sequencer loop length
    ApplySequencerLength { audio: AudioId, length: u64 },
    /// Flip one trigger bit of a channel's pattern
    TogglePatternBit {
        channel: ChannelId,
        bank_0: usize,
        bank_1: usize,
        bit: usize,
    },
    /// Mute/unmute one input channel
    SetMuted { channel: ChannelId, muted: bool },
    /// Change the transport tempo
    SetBpm { bpm: f64 },
    /// Set or clear the transport loop, in sequencer steps
    SetLoop { bounds: Option<(u64, u64)> },
    /// Enable/disable wave capture on an audio
    SetRecord { audio: AudioId, enabled: bool },
    /// Attach a WAV writer to the master bus for `frames` frames
    ExportOutput { path: PathBuf, frames: u64 },
}

impl Task {
    /// Short name for reports and logs
    pub fn name(&self) -> &'static str {
        match self {
            Task::StartAudio { .. } => "start-audio",
            Task::CancelAudio { .. } => "cancel-audio",
            Task::ResizeAudio { .. } => "resize-audio",
            Task::LinkChannel { .. } => "link-channel",
            Task::ApplyTact { .. } => "apply-tact",
            Task::ApplySequencerLength { .. } => "apply-sequencer-length",
            Task::TogglePatternBit { .. } => "toggle-pattern-bit",
            Task::SetMuted { .. } => "set-muted",
            Task::SetBpm { .. } => "set-bpm",
            Task::SetLoop { .. } => "set-loop",
            Task::SetRecord { .. } => "set-record",
            Task::ExportOutput { .. } => "export-output",
        }
    }
}

/// Outcome of one executed task
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: &'static str,
    pub result: Result<(), String>,
}

/// Receiving side of the report channel
pub type ReportReceiver = crossbeam::channel::Receiver<TaskReport>;
pub(crate) type ReportSender = crossbeam::channel::Sender<TaskReport>;

/// Control-thread handle for queueing tasks
///
/// Pushing never blocks; a full queue returns the task so the caller
/// can retry or drop it.
pub struct TaskLauncher {
    producer: rtrb::Producer<Task>,
}

impl TaskLauncher {
    pub fn launch(&mut self, task: Task) -> Result<(), Task> {
        self.producer.push(task).map_err(|e| match e {
            rtrb::PushError::Full(task) => {
                log::warn!("task queue full, task returned to caller");
                task
            }
        })
    }

    /// Whether the queue currently has room
    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}

/// Create the task queue pair
pub fn task_channel() -> (TaskLauncher, rtrb::Consumer<Task>) {
    let (producer, consumer) = rtrb::RingBuffer::new(TASK_QUEUE_CAPACITY);
    (TaskLauncher { producer }, consumer)
}
