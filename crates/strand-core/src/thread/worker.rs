//! Bounded worker pool for off-band work
//!
//! Staged callbacks never block on I/O; anything file-shaped (export
//! finalization, sample loading) is handed to this pool instead. A
//! worker takes one job from the shared channel, runs it, and goes back
//! to waiting - the borrow-one-unit-return contract of a returnable
//! worker, rendered as a conventional pool.

use crossbeam::channel::{bounded, Sender};
use std::thread::{self, JoinHandle};

/// One queued unit of work
type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: crossbeam::channel::Receiver<Message>) -> Self {
        let thread = thread::Builder::new()
            .name(format!("strand-worker-{}", id))
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        Message::Run(job) => job(),
                        Message::Shutdown => break,
                    }
                }
                log::debug!("worker {} stopped", id);
            })
            .expect("Failed to spawn worker thread");
        Self {
            thread: Some(thread),
        }
    }
}

/// Fixed-size pool with a bounded job channel
pub struct WorkerPool {
    sender: Sender<Message>,
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing a channel of `capacity` queued jobs
    pub fn new(size: usize, capacity: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = bounded(capacity.max(size));
        let workers = (0..size)
            .map(|id| Worker::new(id, receiver.clone()))
            .collect();
        log::info!("worker pool started with {} threads", size);
        Self { sender, workers }
    }

    /// Queue one job; blocks only when the job channel is full
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Message::Run(Box::new(job))).is_err() {
            log::error!("worker pool channel closed, job dropped");
        }
    }

    /// Queue one job without blocking; returns false if the channel is full
    pub fn try_execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.try_send(Message::Run(Box::new(job))).is_ok()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
