//! Audio loop - the root engine thread
//!
//! Owns the engine exclusively and drives the tick cycle: drain tasks,
//! run the staged pass, advance the soundcard. With a live backend the
//! soundcard's ring backpressure paces the loop; the offline soundcard
//! runs as fast as the renderer asks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::Engine;

/// Handle to the running loop; stop or drop to shut down
pub struct AudioLoopHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AudioLoopHandle {
    /// Signal the loop to stop after the current tick and join it
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for AudioLoopHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Move the engine onto its own thread and start ticking
pub fn start(engine: Engine) -> AudioLoopHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name("audio-loop".to_string())
        .spawn(move || {
            let mut engine = engine;
            log::info!("audio loop started");
            while !stop_flag.load(Ordering::Relaxed) {
                engine.process_tasks();
                engine.tick();
            }
            log::info!("audio loop stopped");
        })
        .expect("Failed to spawn audio loop thread");

    AudioLoopHandle {
        stop,
        thread: Some(thread),
    }
}
