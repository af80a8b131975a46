//! Stage dispatcher
//!
//! Drives the tick's three phases across every active voice with a
//! strict barrier between them: all `pre` callbacks complete before any
//! `inter` begins, all `inter` before any `post`. Within a phase,
//! voices are dispatched by recycling-context depth, children before
//! parents, so a sub-mix exists before the bus that consumes it.
//!
//! Two modes share the same schedule: inline (the audio loop runs every
//! voice itself) and super-threaded (a fixed team of channel threads
//! splits the voices of each depth group).

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::engine::VoiceRef;
use crate::recall::{Stage, TickContext};

enum StageJob {
    Run {
        voice: VoiceRef,
        stage: Stage,
        tick: TickContext,
    },
    Shutdown,
}

struct ChannelThread {
    thread: Option<JoinHandle<()>>,
}

impl ChannelThread {
    fn new(id: usize, jobs: Receiver<StageJob>, done: Sender<()>) -> Self {
        let thread = thread::Builder::new()
            .name(format!("channel-thread-{}", id))
            .spawn(move || {
                // wait -> running -> wait, until shutdown
                while let Ok(job) = jobs.recv() {
                    match job {
                        StageJob::Run { voice, stage, tick } => {
                            if let Ok(mut voice) = voice.lock() {
                                voice.run_stage(stage, &tick);
                            }
                            if done.send(()).is_err() {
                                break;
                            }
                        }
                        StageJob::Shutdown => break,
                    }
                }
                log::debug!("channel thread {} stopped", id);
            })
            .expect("Failed to spawn channel thread");
        Self {
            thread: Some(thread),
        }
    }
}

struct WorkerTeam {
    job_tx: Sender<StageJob>,
    done_rx: Receiver<()>,
    threads: Vec<ChannelThread>,
}

impl WorkerTeam {
    fn new(size: usize) -> Self {
        let (job_tx, job_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        let threads = (0..size.max(1))
            .map(|id| ChannelThread::new(id, job_rx.clone(), done_tx.clone()))
            .collect();
        Self {
            job_tx,
            done_rx,
            threads,
        }
    }

    /// Dispatch one depth group for one stage and wait for all of it
    fn run_group(&self, group: &[VoiceRef], stage: Stage, tick: &TickContext) {
        for voice in group {
            let job = StageJob::Run {
                voice: VoiceRef::clone(voice),
                stage,
                tick: *tick,
            };
            if self.job_tx.send(job).is_err() {
                log::error!("channel threads gone, staging aborted");
                return;
            }
        }
        for _ in group {
            if self.done_rx.recv().is_err() {
                log::error!("channel threads gone mid-stage");
                return;
            }
        }
    }
}

impl Drop for WorkerTeam {
    fn drop(&mut self) {
        for _ in &self.threads {
            let _ = self.job_tx.send(StageJob::Shutdown);
        }
        for thread in &mut self.threads {
            if let Some(handle) = thread.thread.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Runs one tick's staged pass over the active voices
pub struct StageDispatcher {
    team: Option<WorkerTeam>,
}

impl StageDispatcher {
    /// Inline mode: the calling thread runs every voice
    pub fn inline() -> Self {
        Self { team: None }
    }

    /// Super-threaded mode with a fixed channel-thread team
    pub fn super_threaded(threads: usize) -> Self {
        Self {
            team: Some(WorkerTeam::new(threads)),
        }
    }

    pub fn is_super_threaded(&self) -> bool {
        self.team.is_some()
    }

    /// Run all three phases over `voices` for this tick
    pub fn run_tick(&self, voices: &[VoiceRef], tick: &TickContext) {
        if voices.is_empty() {
            return;
        }

        // depth groups, deepest first
        let mut ordered: Vec<VoiceRef> = voices.to_vec();
        ordered.sort_by_key(|voice| {
            std::cmp::Reverse(voice.lock().map(|v| v.depth()).unwrap_or(0))
        });
        let mut groups: Vec<Vec<VoiceRef>> = Vec::new();
        let mut last_depth = None;
        for voice in ordered {
            let depth = voice.lock().map(|v| v.depth()).unwrap_or(0);
            if last_depth != Some(depth) {
                groups.push(Vec::new());
                last_depth = Some(depth);
            }
            groups.last_mut().expect("group just pushed").push(voice);
        }

        for stage in Stage::ALL {
            for group in &groups {
                match &self.team {
                    Some(team) => team.run_group(group, stage, tick),
                    None => {
                        for voice in group {
                            if let Ok(mut voice) = voice.lock() {
                                voice.run_stage(stage, tick);
                            }
                        }
                    }
                }
            }
        }
    }
}
