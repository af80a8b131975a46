//! Pattern-trigger playback
//!
//! The sequencer chain: the audio level carries the bank selection, the
//! channel level binds one input channel's pattern, and the channel-run
//! level fires a one-shot copy of the recycling's template whenever the
//! pattern bit for the voice's current step is set.

use std::sync::{Arc, Mutex};

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::graph::Recycling;
use crate::timeline::Pattern;
use crate::types::ChannelId;
use crate::voice::RecallId;

pub const BANK_0_PORT: &str = "bank-0";
pub const BANK_1_PORT: &str = "bank-1";

/// Audio-level data: which bank page the machine plays
pub struct CopyPatternAudio {
    base: RecallBase,
}

impl CopyPatternAudio {
    pub fn template(ports: Vec<Arc<Port>>) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("copy-pattern-audio", RecallScope::Audio)
                .with_ports(ports),
        })
    }

    /// The container-shared bank selection ports
    pub fn bank_ports() -> Vec<Arc<Port>> {
        vec![
            Port::new(BANK_0_PORT, PortValue::UInt(0)),
            Port::new(BANK_1_PORT, PortValue::UInt(0)),
        ]
    }
}

impl Recall for CopyPatternAudio {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, _voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
        })
    }
}

/// Channel-level data: binds the pattern of one input channel
pub struct CopyPatternChannel {
    base: RecallBase,
}

impl CopyPatternChannel {
    pub fn template(channel: ChannelId) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("copy-pattern-channel", RecallScope::Channel)
                .with_channel(channel),
        })
    }
}

impl Recall for CopyPatternChannel {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, _voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
        })
    }
}

/// Channel-run level: the per-voice trigger
pub struct CopyPatternChannelRun {
    base: RecallBase,
    pattern: Arc<Mutex<Pattern>>,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
}

impl CopyPatternChannelRun {
    pub fn template(
        channel: ChannelId,
        pattern: Arc<Mutex<Pattern>>,
        recycling: Arc<Mutex<Recycling>>,
        ports: Vec<Arc<Port>>,
    ) -> Box<dyn Recall> {
        Box::new(Self {
            base: RecallBase::template("copy-pattern-channel-run", RecallScope::ChannelRun)
                .with_channel(channel)
                .with_ports(ports),
            pattern,
            recycling,
            voice: None,
        })
    }

    /// Fire the template one-shot when the step's bit is set
    fn trigger(&mut self, tick: &TickContext) {
        let Some(voice) = &self.voice else {
            return;
        };
        if voice.expired.load(std::sync::atomic::Ordering::Relaxed) {
            self.base.done();
            return;
        }
        if !tick.step_begins {
            return;
        }

        let bank_0 = self
            .base
            .port(BANK_0_PORT)
            .map(|port| port.safe_read().as_uint() as usize)
            .unwrap_or(0);
        let bank_1 = self
            .base
            .port(BANK_1_PORT)
            .map(|port| port.safe_read().as_uint() as usize)
            .unwrap_or(0);
        let offset = voice.sequencer_offset.load(std::sync::atomic::Ordering::Relaxed) as usize;

        let on = {
            let pattern = self.pattern.lock().expect("pattern lock poisoned");
            offset < pattern.length() && pattern.bit(bank_0, bank_1, offset)
        };
        if !on {
            return;
        }

        let mut recycling = self.recycling.lock().expect("recycling lock poisoned");
        let signal = recycling.create_signal();
        let template = recycling.template();
        let template = template.lock().expect("template lock poisoned");
        let mut signal = signal.lock().expect("signal lock poisoned");
        signal.duplicate_stream_from(&template);
        signal.set_attack(tick.attack);
        signal.set_delay(tick.absolute_delay);
        signal.set_recall_id(Arc::clone(&voice.recall_id));
    }
}

impl Recall for CopyPatternChannelRun {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            pattern: Arc::clone(&self.pattern),
            recycling: Arc::clone(&self.recycling),
            voice: Some(Arc::clone(voice)),
        })
    }

    fn run_init_pre(&mut self, tick: &TickContext) {
        // the voice's first tick is step zero
        self.trigger(tick);
    }

    fn run_pre(&mut self, tick: &TickContext) {
        self.trigger(tick);
    }
}
