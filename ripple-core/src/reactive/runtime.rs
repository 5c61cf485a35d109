//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos,
//! effects and observed objects. It owns the dependency graph and the
//! property store and schedules notifications when dependencies change.
//!
//! # How It Works
//!
//! 1. When a signal, memo or effect is created, it registers a node with the
//!    runtime (and, for subscribers, a weak owner to call back into).
//!
//! 2. When a subscriber runs, a [`TrackingScope`] makes it the active
//!    subscriber and every read links the dependency to it.
//!
//! 3. When a dependency changes, the runtime:
//!    a. Marks downstream subscribers dirty (or pending, behind memos)
//!    b. Collects the effects reached
//!    c. Releases the graph and notifies them in order
//!    d. Memos are lazy - they recompute on next access
//!
//! # Thread Model
//!
//! The runtime is thread-local and single threaded. User code is never
//! called while the runtime state is borrowed, so effects and memos are free
//! to read and write reactive state re-entrantly.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use slotmap::SecondaryMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::store::DepStore;
use crate::graph::{Graph, NodeId, NodeKind, Orphans, SubscriberFlags};

/// A trait for subscribers the runtime can call back into.
pub trait Reactive {
    /// Get the graph node of this reactive value.
    fn node_id(&self) -> NodeId;

    /// A dependency changed. Effects schedule themselves here.
    fn notify(self: Rc<Self>) {}

    /// Bring a derived value up to date. Returns whether its value changed.
    fn refresh(&self) -> bool {
        false
    }
}

pub(crate) struct State {
    pub(crate) graph: Graph,
    pub(crate) store: DepStore,
    owners: SecondaryMap<NodeId, Weak<dyn Reactive>>,
}

impl State {
    fn new() -> Self {
        Self {
            graph: Graph::new(),
            store: DepStore::default(),
            owners: SecondaryMap::new(),
        }
    }

    /// Free store nodes that lost their last subscriber.
    pub(crate) fn release(&mut self, orphans: Orphans) {
        for id in orphans {
            if self.store.forget_node(id) {
                tracing::debug!(node = ?id, "released unobserved property");
                self.graph.remove(id);
            }
        }
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::new());
}

pub(crate) fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Like [`with_state`], but silently does nothing during thread teardown or
/// when the state is already borrowed. Used from `Drop` impls.
pub(crate) fn try_with_state(f: impl FnOnce(&mut State)) {
    let _ = STATE.try_with(|state| {
        if let Ok(mut state) = state.try_borrow_mut() {
            f(&mut state);
        }
    });
}

/// Scope of one tracking pass.
///
/// Dropping it (normally or during a panic) ends the pass and restores the
/// previous active subscriber.
#[must_use = "the tracking pass ends as soon as the scope is dropped"]
pub struct TrackingScope {
    id: NodeId,
    _ctx: ReactiveContext,
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        let panicking = std::thread::panicking();
        let id = self.id;
        try_with_state(|state| {
            let orphans = state.graph.end_tracking(id);
            if panicking && state.graph.flags(id).contains(SubscriberFlags::COMPUTED) {
                state.graph.set_flags(id, SubscriberFlags::DIRTY);
            }
            state.release(orphans);
        });
    }
}

/// The reactive runtime of the current thread.
pub struct Runtime;

impl Runtime {
    /// Create a node in the graph.
    pub fn create(kind: NodeKind) -> NodeId {
        with_state(|state| state.graph.insert(kind))
    }

    /// Register the owner the runtime calls back into for its node.
    pub fn register<R: Reactive + 'static>(owner: &Rc<R>) {
        let weak = Rc::downgrade(owner);
        let weak: Weak<dyn Reactive> = weak;
        let id = owner.node_id();
        with_state(|state| {
            state.owners.insert(id, weak);
        });
    }

    /// Remove a node and every link touching it.
    pub fn dispose(id: NodeId) {
        try_with_state(|state| {
            state.owners.remove(id);
            let orphans = state.graph.remove(id);
            state.release(orphans);
            tracing::trace!(node = ?id, "disposed");
        });
    }

    /// Record that the current subscriber, if any, read `dep`.
    pub fn track(dep: NodeId) {
        if let Some(sub) = ReactiveContext::current_subscriber() {
            with_state(|state| {
                state.graph.link(dep, sub);
            });
        }
    }

    /// Start a tracking pass for `id`.
    pub fn begin_tracking(id: NodeId) -> TrackingScope {
        with_state(|state| state.graph.start_tracking(id));
        TrackingScope {
            id,
            _ctx: ReactiveContext::enter(id),
        }
    }

    /// Propagate a change of every node in `sources` in a single pass.
    ///
    /// This is the core update propagation mechanism.
    pub fn propagate(sources: &[NodeId]) {
        if sources.is_empty() {
            return;
        }

        let effects: SmallVec<[Rc<dyn Reactive>; 8]> = with_state(|state| {
            let ids = state.graph.propagate(sources);
            ids.into_iter()
                .filter_map(|id| state.owners.get(id).and_then(Weak::upgrade))
                .collect()
        });

        // The runtime is released: effects may read and write freely.
        for effect in effects {
            effect.notify();
        }
    }

    /// Pull every pending derived dependency of `sub`.
    ///
    /// Returns whether `sub` ended up dirty. Clears its pending flag.
    pub fn refresh_dependencies(sub: NodeId) -> bool {
        let candidates: SmallVec<[Rc<dyn Reactive>; 4]> = with_state(|state| {
            state
                .graph
                .dependencies(sub)
                .into_iter()
                .filter(|&dep| {
                    let flags = state.graph.flags(dep);
                    flags.contains(SubscriberFlags::COMPUTED)
                        && flags.intersects(
                            SubscriberFlags::DIRTY | SubscriberFlags::PENDING_COMPUTED,
                        )
                })
                .filter_map(|dep| state.owners.get(dep).and_then(Weak::upgrade))
                .collect()
        });

        for memo in candidates {
            // A changed memo promotes its pending subscribers, `sub` included.
            if memo.refresh() {
                break;
            }
        }

        with_state(|state| {
            state.graph.clear_flags(sub, SubscriberFlags::PENDING_COMPUTED);
            state.graph.flags(sub).contains(SubscriberFlags::DIRTY)
        })
    }

    /// Promote pending subscribers of `dep` after it changed.
    pub fn mark_subscribers_dirty(dep: NodeId) {
        with_state(|state| state.graph.mark_subscribers_dirty(dep));
    }

    /// Get the flags of a node.
    pub fn flags(id: NodeId) -> SubscriberFlags {
        with_state(|state| state.graph.flags(id))
    }

    pub fn clear_flags(id: NodeId, flags: SubscriberFlags) {
        with_state(|state| state.graph.clear_flags(id, flags));
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<NodeId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of links between `dep` and `sub`.
    pub fn links_between(dep: NodeId, sub: NodeId) -> usize {
        with_state(|state| state.graph.links_between(dep, sub))
    }

    /// Dependencies of `sub`, in read order.
    pub fn dependencies(sub: NodeId) -> Vec<NodeId> {
        with_state(|state| state.graph.dependencies(sub).into_vec())
    }

    /// Subscribers of `dep`, in link order.
    pub fn subscribers(dep: NodeId) -> Vec<NodeId> {
        with_state(|state| state.graph.subscribers(dep).into_vec())
    }

    /// Total number of live nodes.
    pub fn node_count() -> usize {
        with_state(|state| state.graph.node_count())
    }

    /// Total number of live links.
    pub fn link_count() -> usize {
        with_state(|state| state.graph.link_count())
    }
}
