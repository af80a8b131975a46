//! Peak meter
//!
//! Publishes the per-tick peak of a channel's live signals through the
//! `peak` port after the streaming phase, for meters on the control
//! thread to poll.

use std::sync::{Arc, Mutex};

use super::{Port, PortValue, Recall, RecallBase, RecallScope, TickContext, VoiceContext};
use crate::graph::Recycling;
use crate::types::ChannelId;
use crate::voice::RecallId;

pub const PEAK_PORT: &str = "peak";

pub struct PeakChannel {
    base: RecallBase,
    recycling: Arc<Mutex<Recycling>>,
    voice: Option<Arc<VoiceContext>>,
}

impl PeakChannel {
    pub fn template(
        channel: ChannelId,
        recycling: Arc<Mutex<Recycling>>,
    ) -> (Box<dyn Recall>, Arc<Port>) {
        let peak = Port::new(PEAK_PORT, PortValue::Float(0.0));
        let template = Box::new(Self {
            base: RecallBase::template("peak-channel", RecallScope::Channel)
                .with_channel(channel)
                .with_ports(vec![Arc::clone(&peak)]),
            recycling,
            voice: None,
        });
        (template, peak)
    }

    fn measure(&mut self) {
        let Some(voice) = &self.voice else {
            return;
        };
        let mut peak: f64 = 0.0;
        {
            let recycling = self.recycling.lock().expect("recycling lock poisoned");
            for signal in recycling.signals() {
                let signal = match signal.lock() {
                    Ok(signal) => signal,
                    Err(_) => continue,
                };
                if signal.is_template()
                    || signal.is_done()
                    || !signal.belongs_to(&voice.recall_id)
                {
                    continue;
                }
                if let Some(buffer) = signal.current_buffer() {
                    peak = peak.max(buffer.peak());
                }
            }
        }
        if let Some(port) = self.base.port(PEAK_PORT) {
            port.safe_write(PortValue::Float(peak));
        }
    }
}

impl Recall for PeakChannel {
    fn base(&self) -> &RecallBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RecallBase {
        &mut self.base
    }

    fn duplicate(&self, recall_id: &Arc<RecallId>, voice: &Arc<VoiceContext>) -> Box<dyn Recall> {
        Box::new(Self {
            base: self.base.instantiate(recall_id),
            recycling: Arc::clone(&self.recycling),
            voice: Some(Arc::clone(voice)),
        })
    }

    fn run_init_post(&mut self, _tick: &TickContext) {
        self.measure();
    }

    fn run_post(&mut self, _tick: &TickContext) {
        self.measure();
    }
}
