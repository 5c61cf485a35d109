//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! is itself a dependency node in the graph, so no external store is
//! involved.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a memo or effect is running, the signal
//!    links itself to that subscriber.
//!
//! 2. When a signal's value changes, all subscribers are notified.
//!
//! 3. Writing a value equal to the current one does nothing.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A graph node (a slot-map key)
//! - The value, behind a `RefCell`
//!
//! Clones share both. The node is freed when the last clone is dropped.

use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::runtime::Runtime;
use crate::graph::{NodeId, NodeKind};

struct SignalInner<T> {
    id: NodeId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::dispose(self.id);
    }
}

/// A reactive cell holding a value of type T.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: Runtime::create(NodeKind::Source),
                value: RefCell::new(value),
            }),
        }
    }

    /// Get the signal's graph node.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.id);
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without tracking.
    pub fn borrow_untracked(&self) -> Ref<'_, T> {
        self.inner.value.borrow()
    }

    /// Force a notification of every subscriber, changed or not.
    pub fn trigger(&self) {
        Runtime::propagate(&[self.inner.id]);
    }

    /// Number of subscribers currently linked to this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscribers(self.inner.id).len()
    }

    /// Whether two handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify subscribers if it differs from the old one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }

        Runtime::propagate(&[self.inner.id]);
        true
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Signals compare by identity.
impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
