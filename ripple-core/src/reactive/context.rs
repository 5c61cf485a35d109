//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! the subscriber onto the stack. When the computation completes, we pop it.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo). An untracked entry hides every outer subscriber until
//! it is popped.

use std::cell::RefCell;

use crate::graph::NodeId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<NodeId>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct ReactiveContext {
    subscriber: Option<NodeId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any dependency that is read will
    /// register the subscriber as a dependent.
    pub fn enter(subscriber: NodeId) -> Self {
        Self::push(Some(subscriber))
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber: Option<NodeId>) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(subscriber));
        Self { subscriber }
    }

    /// Check if there is an active subscriber.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        CONTEXT_STACK
            .try_with(|stack| stack.borrow().last().copied().flatten())
            .ok()
            .flatten()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry, self.subscriber,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber, entry
                );
            }
        });
    }
}

/// Run `f` without registering any dependency on the current subscriber.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<NodeId> {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn context_tracks_subscriber() {
        let id = ids(1)[0];

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts() {
        let ids = ids(2);
        let (id1, id2) = (ids[0], ids[1]);

        {
            let _ctx1 = ReactiveContext::enter(id1);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(id2);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_hides_outer_subscriber() {
        let id = ids(1)[0];
        let _ctx = ReactiveContext::enter(id);

        let inner = untracked(ReactiveContext::current_subscriber);
        assert_eq!(inner, None);
        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
    }

    #[test]
    fn context_is_restored_after_panic() {
        let id = ids(1)[0];

        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(id);
            panic!("boom");
        });

        assert!(result.is_err());
        assert!(ReactiveContext::current_subscriber().is_none());
    }
}
