//! Per-voice recycling topology

use std::sync::{Arc, Mutex};

use crate::types::ChannelId;

/// Mirror of the recycling routing for one voice
///
/// The parent chain matches the audio routing depth at the moment the
/// voice started: output context -> mixed-in audios -> the leaf
/// recyclings. Topology resizes after that never touch an existing
/// context; stale voices drain to their natural end (the new topology
/// only applies to voices started later).
pub struct RecyclingContext {
    parent: Option<Arc<RecyclingContext>>,
    /// Recycling slots, keyed by position; a slot names the channel
    /// owning the physical recycling this voice plays through
    children: Mutex<Vec<Option<ChannelId>>>,
}

impl RecyclingContext {
    /// Allocate a context holding exactly `n_children` unset slots
    pub fn new(n_children: usize) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            children: Mutex::new(vec![None; n_children]),
        })
    }

    /// Allocate a child context below `parent`
    pub fn with_parent(parent: &Arc<RecyclingContext>, n_children: usize) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            children: Mutex::new(vec![None; n_children]),
        })
    }

    pub fn parent(&self) -> Option<&Arc<RecyclingContext>> {
        self.parent.as_ref()
    }

    /// Number of recycling slots
    pub fn child_count(&self) -> usize {
        self.children.lock().expect("context lock poisoned").len()
    }

    /// Bind a recycling into `position`; out-of-range positions log
    pub fn replace(&self, recycling: ChannelId, position: usize) {
        let mut children = self.children.lock().expect("context lock poisoned");
        match children.get_mut(position) {
            Some(slot) => *slot = Some(recycling),
            None => log::warn!(
                "recycling_context: position {} out of range ({} slots)",
                position,
                children.len()
            ),
        }
    }

    /// The recycling bound at `position`
    pub fn child(&self, position: usize) -> Option<ChannelId> {
        self.children
            .lock()
            .expect("context lock poisoned")
            .get(position)
            .copied()
            .flatten()
    }

    /// Find which slot holds `recycling`
    pub fn position_of(&self, recycling: ChannelId) -> Option<usize> {
        self.children
            .lock()
            .expect("context lock poisoned")
            .iter()
            .position(|slot| *slot == Some(recycling))
    }

    /// Distance to the root context
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.parent.clone();
        while let Some(context) = node {
            depth += 1;
            node = context.parent.clone();
        }
        depth
    }
}

impl std::fmt::Debug for RecyclingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecyclingContext")
            .field("depth", &self.depth())
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioId, ChannelKind};

    fn channel(line: usize) -> ChannelId {
        ChannelId::new(AudioId(0), ChannelKind::Input, line)
    }

    #[test]
    fn test_slots_start_unset() {
        let context = RecyclingContext::new(3);
        assert_eq!(context.child_count(), 3);
        assert_eq!(context.child(0), None);
        assert_eq!(context.child(2), None);
    }

    #[test]
    fn test_replace_binds_slot() {
        let context = RecyclingContext::new(2);
        context.replace(channel(5), 1);
        assert_eq!(context.child(1), Some(channel(5)));
        assert_eq!(context.child(0), None);
        assert_eq!(context.position_of(channel(5)), Some(1));
    }

    #[test]
    fn test_out_of_range_replace_ignored() {
        let context = RecyclingContext::new(1);
        context.replace(channel(0), 7);
        assert_eq!(context.child(0), None);
    }

    #[test]
    fn test_depth_follows_parent_chain() {
        let root = RecyclingContext::new(1);
        let mid = RecyclingContext::with_parent(&root, 1);
        let leaf = RecyclingContext::with_parent(&mid, 1);

        assert_eq!(root.depth(), 0);
        assert_eq!(mid.depth(), 1);
        assert_eq!(leaf.depth(), 2);
        assert!(Arc::ptr_eq(leaf.parent().unwrap(), &mid));
    }
}
