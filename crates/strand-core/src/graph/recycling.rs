//! Recycling - the owner of one channel port's signal lineage
//!
//! A recycling holds the live signals of one channel plus the single
//! canonical template ("silence skeleton") they are spliced from.
//! Signals are handed out as shared references; the cleanup pass
//! between ticks drops the ones marked done, and `basedrop` defers the
//! actual free off the audio thread.

use std::sync::Mutex;

use basedrop::{Handle, Shared};

use super::AudioSignal;
use crate::types::{ChannelId, SampleFormat};

/// Shared reference to a signal; drops are deferred to the GC thread
pub type SignalRef = Shared<Mutex<AudioSignal>>;

pub struct Recycling {
    channel: ChannelId,
    template: SignalRef,
    signals: Vec<SignalRef>,
    gc: Handle,
}

impl Recycling {
    pub fn new(
        channel: ChannelId,
        format: SampleFormat,
        samplerate: u32,
        buffer_size: usize,
        gc: &Handle,
    ) -> Self {
        let template = Shared::new(
            gc,
            Mutex::new(AudioSignal::new_template(format, samplerate, buffer_size)),
        );
        Self {
            channel,
            template,
            signals: Vec::new(),
            gc: gc.clone(),
        }
    }

    /// The channel owning this recycling
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Update the back-reference after the owning channel is renumbered
    pub(crate) fn set_channel(&mut self, channel: ChannelId) {
        self.channel = channel;
    }

    /// The canonical template signal
    pub fn template(&self) -> &SignalRef {
        &self.template
    }

    /// Allocate a fresh non-template signal with this recycling's
    /// presets and attach it
    pub fn create_signal(&mut self) -> SignalRef {
        let (format, samplerate, buffer_size) = {
            let template = self.template.lock().expect("template lock poisoned");
            (
                template.format(),
                template.samplerate(),
                template.buffer_size(),
            )
        };
        let signal = Shared::new(
            &self.gc,
            Mutex::new(AudioSignal::new(format, samplerate, buffer_size)),
        );
        self.signals.push(Shared::clone(&signal));
        signal
    }

    /// Attach an externally created signal
    pub fn add_signal(&mut self, signal: SignalRef) {
        self.signals.push(signal);
    }

    /// Live signals, oldest first
    pub fn signals(&self) -> &[SignalRef] {
        &self.signals
    }

    /// Drop signals marked done; returns how many were removed
    ///
    /// Runs between ticks only - a consumer holding its own `SignalRef`
    /// keeps the stream alive until it lets go.
    pub fn remove_done(&mut self) -> usize {
        let before = self.signals.len();
        self.signals.retain(|signal| {
            !signal
                .lock()
                .map(|signal| signal.is_done())
                .unwrap_or(true)
        });
        before - self.signals.len()
    }

    /// Drop done signals and signals whose voice is no longer attached
    ///
    /// `live` is the owning channel's audio recall-id list; a signal
    /// tagged with a detached voice has no consumer left. Untagged
    /// signals are kept.
    pub fn remove_finished(&mut self, live: &[std::sync::Arc<crate::voice::RecallId>]) -> usize {
        let before = self.signals.len();
        self.signals.retain(|signal| {
            let Ok(signal) = signal.lock() else {
                return false;
            };
            if signal.is_done() {
                return false;
            }
            match signal.recall_id() {
                Some(id) => live.iter().any(|l| std::sync::Arc::ptr_eq(l, id)),
                None => true,
            }
        });
        before - self.signals.len()
    }
}

impl std::fmt::Debug for Recycling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recycling")
            .field("channel", &self.channel)
            .field("signals", &self.signals.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::GcService;
    use crate::types::{AudioId, ChannelKind};

    fn recycling(gc: &GcService) -> Recycling {
        Recycling::new(
            ChannelId::new(AudioId(0), ChannelKind::Input, 0),
            SampleFormat::S16,
            48000,
            64,
            &gc.handle(),
        )
    }

    #[test]
    fn test_template_is_marked() {
        let gc = GcService::new();
        let recycling = recycling(&gc);
        assert!(recycling.template().lock().unwrap().is_template());
        assert!(recycling.signals().is_empty());
    }

    #[test]
    fn test_create_signal_inherits_presets() {
        let gc = GcService::new();
        let mut recycling = recycling(&gc);
        let signal = recycling.create_signal();

        let signal = signal.lock().unwrap();
        assert!(!signal.is_template());
        assert_eq!(signal.format(), SampleFormat::S16);
        assert_eq!(signal.buffer_size(), 64);
        assert_eq!(recycling.signals().len(), 1);
    }

    #[test]
    fn test_remove_done_keeps_live_signals() {
        let gc = GcService::new();
        let mut recycling = recycling(&gc);
        let done = recycling.create_signal();
        let _live = recycling.create_signal();

        done.lock().unwrap().set_done();
        assert_eq!(recycling.remove_done(), 1);
        assert_eq!(recycling.signals().len(), 1);
        assert!(!recycling.signals()[0].lock().unwrap().is_done());
    }

    #[test]
    fn test_holder_keeps_removed_signal_alive() {
        let gc = GcService::new();
        let mut recycling = recycling(&gc);
        let signal = recycling.create_signal();
        signal.lock().unwrap().set_done();
        recycling.remove_done();

        // our reference still reads fine after removal
        assert!(signal.lock().unwrap().is_done());
    }
}
