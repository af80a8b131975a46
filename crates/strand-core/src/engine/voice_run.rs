//! Voice run - one voice's recall instances on one audio

use std::sync::{Arc, Mutex};

use crate::recall::{stage_recall, RecallSlot, Stage, TickContext, VoiceContext};
use crate::types::{AudioId, SoundScope};
use crate::voice::RecallId;

/// Shared handle to a voice run; the dispatcher and the cleanup pass
/// both hold one
pub type VoiceRef = Arc<Mutex<VoiceRun>>;

/// All recall instances duplicated for one voice, in container order
pub struct VoiceRun {
    recall_id: Arc<RecallId>,
    voice: Arc<VoiceContext>,
    audio: AudioId,
    /// Recycling context depth; deeper runs are staged first so a child
    /// sub-mix is produced before its parent consumes it
    depth: usize,
    slots: Vec<RecallSlot>,
}

impl VoiceRun {
    pub fn new(
        recall_id: Arc<RecallId>,
        voice: Arc<VoiceContext>,
        audio: AudioId,
        slots: Vec<RecallSlot>,
    ) -> VoiceRef {
        let depth = recall_id.context().depth();
        Arc::new(Mutex::new(Self {
            recall_id,
            voice,
            audio,
            depth,
            slots,
        }))
    }

    pub fn recall_id(&self) -> &Arc<RecallId> {
        &self.recall_id
    }

    pub fn voice(&self) -> &Arc<VoiceContext> {
        &self.voice
    }

    pub fn audio(&self) -> AudioId {
        self.audio
    }

    pub fn scope(&self) -> SoundScope {
        self.recall_id.scope()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn slots(&self) -> &[RecallSlot] {
        &self.slots
    }

    /// Drive every instance through one stage
    pub fn run_stage(&mut self, stage: Stage, tick: &TickContext) {
        for slot in &mut self.slots {
            stage_recall(slot.recall.as_mut(), stage, tick);
        }
    }

    /// Request cooperative cancellation of every instance
    pub fn cancel(&mut self) {
        for slot in &mut self.slots {
            slot.recall.base_mut().cancel();
        }
    }

    /// Whether every instance has finished
    pub fn is_done(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.recall.base().flags().done)
    }

    /// Flag every instance for removal; the run is dropped right after
    pub fn mark_removed(&mut self) {
        for slot in &mut self.slots {
            slot.recall.base_mut().mark_remove();
        }
    }
}
