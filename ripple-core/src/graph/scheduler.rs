//! Job Queue
//!
//! A deferred scheduling policy for effects. Instead of re-running an effect
//! as soon as one of its dependencies changes, its scheduler pushes a job on
//! the queue and the owner decides when to [`flush`](JobQueue::flush).
//!
//! # Algorithm
//!
//! 1. Jobs are keyed by the node of the effect that queued them, so an
//!    effect notified many times before a flush runs once.
//! 2. `flush` runs jobs in the order they were first queued.
//! 3. Jobs queued while flushing run in the same flush. A job that keeps
//!    re-queueing itself is dropped after [`RECURSION_LIMIT`] runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::node::NodeId;
use crate::reactive::Effect;

/// Maximum number of times one job may run during a single flush.
pub const RECURSION_LIMIT: usize = 100;

type Job = Rc<dyn Fn()>;

#[derive(Default)]
struct Queue {
    jobs: IndexMap<NodeId, Job>,
    flushing: bool,
}

/// A deduplicating queue of deferred effect runs.
///
/// Clones share the same queue.
///
/// # Example
///
/// ```rust
/// use ripple_core::graph::JobQueue;
/// use ripple_core::reactive::{Effect, Signal};
///
/// let queue = JobQueue::new();
/// let count = Signal::new(0);
///
/// let render = {
///     let count = count.clone();
///     Effect::with_scheduler(move || { count.get(); }, queue.scheduler())
/// };
///
/// count.set(1);
/// count.set(2);
/// assert_eq!(render.run_count(), 1);
///
/// queue.flush();
/// assert_eq!(render.run_count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct JobQueue {
    inner: Rc<RefCell<Queue>>,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job for `id`. Returns false if one is already queued.
    pub fn push(&self, id: NodeId, job: impl Fn() + 'static) -> bool {
        let mut queue = self.inner.borrow_mut();
        if queue.jobs.contains_key(&id) {
            return false;
        }
        queue.jobs.insert(id, Rc::new(job));
        true
    }

    /// A scheduler that defers effect runs to the next flush.
    ///
    /// Effects stopped before the flush are skipped. Memos an effect reads
    /// through are pulled at flush time, and the effect only runs if one of
    /// them changed.
    pub fn scheduler<T: 'static>(&self) -> impl Fn(&Effect<T>) + 'static {
        let queue = self.clone();
        move |effect| {
            let effect = effect.clone();
            queue.push(effect.id(), move || {
                effect.run_if_dirty();
            });
        }
    }

    /// Run queued jobs until the queue is empty. Returns the number run.
    ///
    /// A flush started from inside a job does nothing.
    pub fn flush(&self) -> usize {
        {
            let mut queue = self.inner.borrow_mut();
            if queue.flushing {
                return 0;
            }
            queue.flushing = true;
        }

        let mut ran = 0;
        let mut counts: HashMap<NodeId, usize> = HashMap::new();
        loop {
            // Never hold the queue while a job runs: jobs may queue more.
            let next = self.inner.borrow_mut().jobs.shift_remove_index(0);
            let Some((id, job)) = next else { break };

            let count = counts.entry(id).or_default();
            *count += 1;
            if *count > RECURSION_LIMIT {
                tracing::warn!(
                    node = ?id,
                    limit = RECURSION_LIMIT,
                    "job exceeded recursion limit, dropped"
                );
                continue;
            }

            job();
            ran += 1;
        }

        self.inner.borrow_mut().flushing = false;
        tracing::trace!(jobs = ran, "queue flushed");
        ran
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.inner.borrow().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().jobs.is_empty()
    }

    /// Drop every queued job without running it.
    pub fn clear(&self) {
        self.inner.borrow_mut().jobs.clear();
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let queue = self.inner.borrow();
        f.debug_struct("JobQueue")
            .field("pending", &queue.jobs.len())
            .field("flushing", &queue.flushing)
            .finish()
    }
}
