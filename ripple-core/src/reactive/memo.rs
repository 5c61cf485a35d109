//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a direct dependency changes, the memo is marked dirty. When a memo
//!    it depends on is marked, it becomes "maybe dirty" instead.
//!
//! 4. On next access, a maybe-dirty memo first brings its upstream memos up
//!    to date and recomputes only if one of them actually changed.
//!
//! 5. A recomputation that produces an equal value reports "unchanged", and
//!    downstream subscribers are left alone.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::runtime::{Reactive, Runtime};
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind, SubscriberFlags};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// An upstream memo might have changed. Need to check.
    MaybeDirty,

    /// The memo definitely needs to recompute.
    Dirty,
}

type Compute<T> = Box<dyn Fn(Option<&T>) -> T>;
type Setter<T> = Box<dyn Fn(T)>;

struct MemoInner<T> {
    id: NodeId,
    compute: Compute<T>,
    setter: Option<Setter<T>>,
    value: RefCell<Option<T>>,
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::dispose(self.id);
    }
}

impl<T: PartialEq + 'static> MemoInner<T> {
    /// Recompute if needed. Returns whether the cached value changed.
    fn refresh(&self) -> bool {
        let flags = Runtime::flags(self.id);
        if flags.contains(SubscriberFlags::DIRTY) {
            return self.update();
        }
        if flags.contains(SubscriberFlags::PENDING_COMPUTED)
            && Runtime::refresh_dependencies(self.id)
        {
            return self.update();
        }
        false
    }

    /// Run the computation as a tracking pass.
    fn update(&self) -> bool {
        let new_value = {
            let _scope = Runtime::begin_tracking(self.id);
            let previous = self.value.borrow();
            (self.compute)(previous.as_ref())
        };

        let changed = self.value.borrow().as_ref() != Some(&new_value);
        if changed {
            *self.value.borrow_mut() = Some(new_value);
            Runtime::mark_subscribers_dirty(self.id);
        }
        changed
    }
}

impl<T: PartialEq + 'static> Reactive for MemoInner<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn refresh(&self) -> bool {
        MemoInner::refresh(self)
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value.
///
/// The PartialEq bound is needed to detect when the computed value actually
/// changed (some memos might return the same value even if inputs changed).
pub struct Memo<T> {
    inner: Rc<MemoInner<T>>,
}

impl<T: PartialEq + 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(Box::new(move |_| compute()), None)
    }

    /// Create a memo whose computation receives the previously cached value.
    pub fn with_previous<F>(compute: F) -> Self
    where
        F: Fn(Option<&T>) -> T + 'static,
    {
        Self::build(Box::new(compute), None)
    }

    /// Create a writable memo. Writes are forwarded to `set`.
    pub fn with_setter<F, S>(compute: F, set: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(Box::new(move |_| compute()), Some(Box::new(set)))
    }

    fn build(compute: Compute<T>, setter: Option<Setter<T>>) -> Self {
        let inner = Rc::new(MemoInner {
            id: Runtime::create(NodeKind::Derived),
            compute,
            setter,
            value: RefCell::new(None),
        });
        Runtime::register(&inner);
        Self { inner }
    }

    /// Get the memo's graph node.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Borrow the current value, recomputing if necessary.
    ///
    /// If called within a reactive context, the memo becomes a dependency of
    /// the running computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.refresh();
        Runtime::track(self.inner.id);

        let value = self.inner.value.borrow();
        f(value
            .as_ref()
            .expect("memo read before its first computation finished"))
    }

    /// Write through the setter.
    ///
    /// A memo without a setter is read-only: the write is dropped and
    /// reported, nothing else happens.
    pub fn set(&self, value: T) -> Result<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                tracing::warn!(memo = ?self.inner.id, "write operation failed: memo is read-only");
                Err(ReactiveError::ReadonlyMemo(self.inner.id))
            }
        }
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        let flags = Runtime::flags(self.inner.id);
        if flags.contains(SubscriberFlags::DIRTY) {
            MemoState::Dirty
        } else if flags.contains(SubscriberFlags::PENDING_COMPUTED) {
            MemoState::MaybeDirty
        } else {
            MemoState::Clean
        }
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        Runtime::subscribers(self.inner.id).len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }
}

impl<T: Clone + PartialEq + 'static> Memo<T> {
    /// Get the current value, recomputing if necessary.
    ///
    /// This is the main entry point for reading a memo's value.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + PartialEq + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
