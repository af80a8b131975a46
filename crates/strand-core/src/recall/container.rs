//! Recall containers
//!
//! A container groups the templates of one logical effect across the
//! five levels so the per-voice clones can locate their siblings. The
//! duplication walk is top-down - Audio, Channel, ChannelRun, Recycling,
//! AudioSignal - threading each level's clone as the parent of the next,
//! so the instance tree mirrors the template grouping but is scoped to
//! one voice.

use std::sync::Arc;

use super::{Port, Recall, RecallScope, VoiceContext};
use crate::types::ChannelId;
use crate::voice::RecallId;

/// Index of a container within its audio's container list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(pub usize);

/// One duplicated recall instance plus its parent link
///
/// `parent` indexes into the same slot list and always points at the
/// nearest shallower-scope instance of the same container.
pub struct RecallSlot {
    pub recall: Box<dyn Recall>,
    pub parent: Option<usize>,
    pub container: ContainerId,
}

/// Template grouping of one logical effect
pub struct RecallContainer {
    id: ContainerId,
    name: String,
    ports: Vec<Arc<Port>>,
    templates: Vec<Box<dyn Recall>>,
}

impl RecallContainer {
    pub fn new(id: ContainerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ports: Vec::new(),
            templates: Vec::new(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a container-shared port
    pub fn add_port(&mut self, port: Arc<Port>) {
        self.ports.push(port);
    }

    pub fn ports(&self) -> &[Arc<Port>] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&Arc<Port>> {
        super::find_port(&self.ports, name)
    }

    /// Add a template, keeping scope order
    pub fn add_template(&mut self, template: Box<dyn Recall>) {
        debug_assert!(template.base().flags().template);
        let scope = template.base().scope();
        let at = self
            .templates
            .partition_point(|t| t.base().scope() <= scope);
        self.templates.insert(at, template);
    }

    pub fn templates(&self) -> &[Box<dyn Recall>] {
        &self.templates
    }

    /// The channel a container's channel-level template is bound to
    pub fn channel(&self) -> Option<ChannelId> {
        self.templates
            .iter()
            .find_map(|template| template.base().channel())
    }

    /// Whether a destination-dependent template for `destination` exists
    pub fn has_destination(&self, destination: ChannelId) -> bool {
        self.templates
            .iter()
            .any(|template| template.base().destination() == Some(destination))
    }

    /// Duplicate every template for a new voice, threading parent links
    pub fn duplicate_for(
        &self,
        recall_id: &Arc<RecallId>,
        voice: &Arc<VoiceContext>,
    ) -> Vec<RecallSlot> {
        let mut slots = Vec::with_capacity(self.templates.len());
        let mut last_at_scope: [Option<usize>; 5] = [None; 5];

        for template in &self.templates {
            let scope = template.base().scope();
            let parent = (0..scope as usize)
                .rev()
                .find_map(|shallower| last_at_scope[shallower]);

            let recall = template.duplicate(recall_id, voice);
            let index = slots.len();
            slots.push(RecallSlot {
                recall,
                parent,
                container: self.id,
            });
            last_at_scope[scope as usize] = Some(index);
        }

        slots
    }
}

impl std::fmt::Debug for RecallContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecallContainer")
            .field("name", &self.name)
            .field("templates", &self.templates.len())
            .finish()
    }
}
