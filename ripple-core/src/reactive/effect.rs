//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect's scheduler is invoked. The
//!    default scheduler re-runs the effect synchronously.
//!
//! 3. Each run is a tracking pass: dependencies read again keep their links,
//!    dependencies no longer read are unlinked at the end.
//!
//! # Schedulers
//!
//! The scheduler is the only policy knob. A renderer replaces it with one
//! that queues the effect and re-renders later (see
//! [`JobQueue`](crate::graph::JobQueue)); the tracking machinery is the same
//! either way.
//!
//! # Differences from Memo
//!
//! - Memos return a cached value; effects return whatever their body returns.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - An effect behind a memo is handed to its scheduler, but its body only
//!   runs if the memo's value changed. The memo is pulled when the scheduler
//!   runs the effect, never during the write.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use crate::graph::{NodeId, NodeKind, SubscriberFlags};

type Scheduler<T> = Rc<dyn Fn(&Effect<T>)>;

struct EffectInner<T> {
    id: NodeId,
    body: Box<dyn Fn() -> T>,
    scheduler: RefCell<Option<Scheduler<T>>>,
    active: Cell<bool>,
    run_count: Cell<usize>,
}

impl<T> Drop for EffectInner<T> {
    fn drop(&mut self) {
        Runtime::dispose(self.id);
    }
}

impl<T: 'static> Reactive for EffectInner<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn notify(self: Rc<Self>) {
        if !self.active.get() {
            return;
        }

        let effect = Effect { inner: self };
        let scheduler = effect.inner.scheduler.borrow().clone();
        match scheduler {
            Some(scheduler) => scheduler(&effect),
            None => {
                effect.run_if_dirty();
            }
        }
    }
}

/// A pass with no reads unlinks every dependency.
fn teardown(id: NodeId) {
    drop(Runtime::begin_tracking(id));
}

/// Tears down an effect stopped during its own run, panic or not.
struct FinishRun<'a, T>(&'a EffectInner<T>);

impl<T> Drop for FinishRun<'_, T> {
    fn drop(&mut self) {
        if !self.0.active.get() {
            teardown(self.0.id);
        }
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// Dropping the last handle stops the effect.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
///
/// let effect = {
///     let count = count.clone();
///     Effect::new(move || println!("Count is: {}", count.get()))
/// };
///
/// count.set(5);  // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect<T = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let effect = Self::new_lazy(body);
        effect.run();
        effect
    }

    /// Create an effect with a custom scheduler and run it once.
    pub fn with_scheduler<F, S>(body: F, scheduler: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(&Effect<T>) + 'static,
    {
        let effect = Self::new_lazy(body);
        effect.set_scheduler(scheduler);
        effect.run();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies, and so is never notified, until it first runs.
    pub fn new_lazy<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new(EffectInner {
            id: Runtime::create(NodeKind::Effect),
            body: Box::new(body),
            scheduler: RefCell::new(None),
            active: Cell::new(true),
            run_count: Cell::new(0),
        });
        Runtime::register(&inner);
        Self { inner }
    }

    /// Replace the policy invoked when a dependency changes.
    pub fn set_scheduler<S>(&self, scheduler: S)
    where
        S: Fn(&Effect<T>) + 'static,
    {
        *self.inner.scheduler.borrow_mut() = Some(Rc::new(scheduler));
    }

    /// Get the effect's graph node.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Execute the effect function as a tracking pass and return its result.
    ///
    /// A stopped effect still runs its body, but tracks nothing.
    pub fn run(&self) -> T {
        self.inner.run_count.set(self.inner.run_count.get() + 1);

        if !self.inner.active.get() {
            let _ctx = ReactiveContext::untracked();
            return (self.inner.body)();
        }

        // Declared before the scope so it drops after the pass has ended.
        let _finish = FinishRun(&self.inner);
        let _scope = Runtime::begin_tracking(self.inner.id);
        (self.inner.body)()
    }

    /// Whether a dependency changed since the last run.
    ///
    /// Pulls memos this effect reads through, so a memo whose value came out
    /// the same does not count as a change. Stopped effects are never dirty.
    pub fn is_dirty(&self) -> bool {
        if !self.inner.active.get() {
            return false;
        }
        let flags = Runtime::flags(self.inner.id);
        flags.contains(SubscriberFlags::DIRTY)
            || (flags.contains(SubscriberFlags::PENDING_COMPUTED)
                && Runtime::refresh_dependencies(self.inner.id))
    }

    /// Run the effect only if [`is_dirty`](Self::is_dirty) says so.
    ///
    /// This is what schedulers call once they decide it is time to run.
    pub fn run_if_dirty(&self) -> Option<T> {
        self.is_dirty().then(|| self.run())
    }

    /// Stop the effect.
    ///
    /// Unlinks every dependency; further changes never run it again.
    /// Stopping twice is a no-op. Stopping from inside the body takes effect
    /// when the body returns.
    pub fn stop(&self) {
        if !self.inner.active.get() {
            return;
        }
        self.inner.active.set(false);
        if !Runtime::flags(self.inner.id).contains(SubscriberFlags::TRACKING) {
            teardown(self.inner.id);
        }
        tracing::debug!(effect = ?self.inner.id, "effect stopped");
    }

    /// Check if the effect is still active.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependencies(self.inner.id).len()
    }

    /// Whether two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.inner.run_count.get())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

/// Something that can be stopped: an effect of any output type.
pub trait Stop {
    fn stop(&self);
    fn is_active(&self) -> bool;
}

impl<T: 'static> Stop for Effect<T> {
    fn stop(&self) {
        Effect::stop(self);
    }

    fn is_active(&self) -> bool {
        Effect::is_active(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
