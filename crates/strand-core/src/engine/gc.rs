//! RT-safe garbage collection for signal buffers
//!
//! Signal streams can hold seconds of audio; freeing them inside the
//! tick would stall the audio thread on the allocator. Dropping a
//! `basedrop::Shared` on the audio thread only enqueues a pointer - the
//! actual deallocation happens on the collector thread owned by this
//! service.
//!
//! The service is constructed with the engine and injected where
//! needed; there is no process-wide collector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::{Collector, Handle};

/// Collection interval; fast enough for memory reclamation
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the collector thread; dropped with the engine
pub struct GcService {
    handle: Handle,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl GcService {
    /// Spawn the collector thread and hand back the service
    pub fn new() -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        // the Collector is not Sync - it lives on its own thread and
        // sends a handle back
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("audio-gc".to_string())
            .spawn(move || {
                let mut collector = Collector::new();
                tx.send(collector.handle())
                    .expect("Failed to send GC handle");

                log::info!("audio GC thread started");
                while !shutdown_flag.load(Ordering::Relaxed) {
                    collector.collect();
                    thread::sleep(COLLECT_INTERVAL);
                }
                collector.collect();
                log::info!("audio GC thread stopped");
            })
            .expect("Failed to spawn audio GC thread");

        let handle = rx.recv().expect("Failed to receive GC handle");

        Self {
            handle,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Handle for creating `Shared<T>` allocations; cheap to clone
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }
}

impl Default for GcService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GcService {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_drop_is_deferred_then_collected() {
        let gc = GcService::new();
        let value = Shared::new(&gc.handle(), vec![0u8; 1024]);
        let clone = Shared::clone(&value);
        drop(value);
        drop(clone);
        // shutting the service down runs a final collect
        drop(gc);
    }
}
