//! Recall id - one playing voice

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::RecyclingContext;
use crate::types::SoundScope;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Identity of one active voice: a (sound scope, recycling context) pair
///
/// Every Audio and Channel a voice traverses holds a reference to the
/// same `RecallId`; recall instances cloned for the voice carry it too.
/// The id dies when all recalls scoped to it have reached done.
pub struct RecallId {
    scope: SoundScope,
    context: Arc<RecyclingContext>,
    serial: u64,
}

impl RecallId {
    pub fn new(scope: SoundScope, context: Arc<RecyclingContext>) -> Arc<Self> {
        Arc::new(Self {
            scope,
            context,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
        })
    }

    pub fn scope(&self) -> SoundScope {
        self.scope
    }

    pub fn context(&self) -> &Arc<RecyclingContext> {
        &self.context
    }

    /// Monotonic id for logs
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl std::fmt::Debug for RecallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecallId")
            .field("serial", &self.serial)
            .field("scope", &self.scope.name())
            .finish()
    }
}

/// Find the recall id bound to `context` in `list`
///
/// Linear scan on pointer identity - this is how an output channel's
/// copy recall locates the parent voice when a child audio's sub-mix
/// feeds a parent bus.
pub fn find_recycling_context<'a>(
    list: &'a [Arc<RecallId>],
    context: &Arc<RecyclingContext>,
) -> Option<&'a Arc<RecallId>> {
    list.iter().find(|id| Arc::ptr_eq(id.context(), context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serials_are_unique() {
        let context = RecyclingContext::new(1);
        let a = RecallId::new(SoundScope::Sequencer, Arc::clone(&context));
        let b = RecallId::new(SoundScope::Sequencer, Arc::clone(&context));
        assert_ne!(a.serial(), b.serial());
    }

    #[test]
    fn test_find_by_context_identity() {
        let context_a = RecyclingContext::new(1);
        let context_b = RecyclingContext::new(1);
        let id_a = RecallId::new(SoundScope::Playback, Arc::clone(&context_a));
        let id_b = RecallId::new(SoundScope::Playback, Arc::clone(&context_b));
        let list = vec![Arc::clone(&id_a), Arc::clone(&id_b)];

        let found = find_recycling_context(&list, &context_b).unwrap();
        assert!(Arc::ptr_eq(found, &id_b));

        let other = RecyclingContext::new(1);
        assert!(find_recycling_context(&list, &other).is_none());
    }

    #[test]
    fn test_two_voices_never_share_a_context() {
        // one context per voice - sharing would collapse their signals
        let id_a = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(2));
        let id_b = RecallId::new(SoundScope::Sequencer, RecyclingContext::new(2));
        assert!(!Arc::ptr_eq(id_a.context(), id_b.context()));
    }
}
