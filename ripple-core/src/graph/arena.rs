//! Link Arena
//!
//! Nodes and links live in two slot maps and refer to each other by key, so
//! the cyclic dependency/subscriber structure never needs owning pointers in
//! both directions.
//!
//! # Algorithm
//!
//! A tracking pass rebuilds a subscriber's dependency list in read order:
//!
//! 1. `start_tracking` rewinds the cursor (`deps_tail`) but keeps the list
//!    from the previous pass.
//! 2. Every read calls `link`, which reuses the link at the cursor position
//!    when it targets the same dependency and otherwise inserts a fresh link
//!    right after the cursor.
//! 3. `end_tracking` unlinks everything the cursor never reached.
//!
//! A change calls `propagate`, which marks subscribers and walks through
//! derived nodes until it reaches the effects that must be notified.

use std::collections::{HashSet, VecDeque};

use slotmap::SlotMap;
use smallvec::SmallVec;

use super::node::{Link, LinkId, Node, NodeId, NodeKind, SubscriberFlags};

/// Dependency nodes whose subscriber list became empty during an operation.
pub type Orphans = SmallVec<[NodeId; 4]>;

/// The dependency graph: an arena of nodes and the links between them.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: SlotMap<NodeId, Node>,
    links: SlotMap<LinkId, Link>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node::new(kind))
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all links involving this node. Returns the dependencies
    /// left without subscribers.
    pub fn remove(&mut self, id: NodeId) -> Orphans {
        let mut orphans = Orphans::new();
        let Some(node) = self.nodes.get(id) else {
            return orphans;
        };
        let (mut deps, mut subs) = (node.deps, node.subs);

        while let Some(link) = deps {
            deps = self.links[link].next_dep;
            match self.unlink(link) {
                Some(dep) if dep != id => orphans.push(dep),
                _ => {}
            }
        }
        while let Some(link) = subs {
            subs = self.links[link].next_sub;
            self.unlink(link);
        }

        self.nodes.remove(id);
        orphans
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get the flags of a node, or an empty set if it is gone.
    pub fn flags(&self, id: NodeId) -> SubscriberFlags {
        self.nodes.get(id).map(Node::flags).unwrap_or_default()
    }

    /// Add `flags` to a node. Missing nodes are ignored.
    pub fn set_flags(&mut self, id: NodeId, flags: SubscriberFlags) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.flags |= flags;
        }
    }

    /// Remove `flags` from a node. Missing nodes are ignored.
    pub fn clear_flags(&mut self, id: NodeId, flags: SubscriberFlags) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.flags.remove(flags);
        }
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the total number of live links in the graph.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Count the links between `dep` and `sub`. Always 0 or 1.
    pub fn links_between(&self, dep: NodeId, sub: NodeId) -> usize {
        self.dependency_links(sub)
            .filter(|&link| self.links[link].dep == dep)
            .count()
    }

    /// Snapshot the dependencies of a subscriber, in read order.
    pub fn dependencies(&self, sub: NodeId) -> SmallVec<[NodeId; 8]> {
        self.dependency_links(sub)
            .map(|link| self.links[link].dep)
            .collect()
    }

    /// Snapshot the subscribers of a dependency, in link order.
    pub fn subscribers(&self, dep: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut out = SmallVec::new();
        let mut cursor = self.nodes.get(dep).and_then(|n| n.subs);
        while let Some(link) = cursor {
            out.push(self.links[link].sub);
            cursor = self.links[link].next_sub;
        }
        out
    }

    fn dependency_links(&self, sub: NodeId) -> impl Iterator<Item = LinkId> + '_ {
        let mut cursor = self.nodes.get(sub).and_then(|n| n.deps);
        std::iter::from_fn(move || {
            let link = cursor?;
            cursor = self.links[link].next_dep;
            Some(link)
        })
    }

    /// Record that `sub` read `dep` during its current tracking pass.
    ///
    /// After this call exactly one link between the two exists.
    pub fn link(&mut self, dep: NodeId, sub: NodeId) -> Option<LinkId> {
        if !self.nodes.contains_key(dep) {
            return None;
        }
        let tail = self.nodes.get(sub)?.deps_tail;

        if let Some(tail) = tail {
            if self.links[tail].dep == dep {
                return Some(tail);
            }
            if let Some(existing) = self.find_in_pass(dep, sub, tail) {
                return Some(existing);
            }
        }

        let next = match tail {
            Some(tail) => self.links[tail].next_dep,
            None => self.nodes[sub].deps,
        };
        if let Some(next) = next {
            if self.links[next].dep == dep {
                tracing::trace!(?dep, ?sub, "reusing link from previous pass");
                self.nodes[sub].deps_tail = Some(next);
                return Some(next);
            }
        }

        Some(self.link_new(dep, sub, next, tail))
    }

    /// Find a link to `dep` among the links already established this pass.
    fn find_in_pass(&self, dep: NodeId, sub: NodeId, tail: LinkId) -> Option<LinkId> {
        let mut cursor = self.nodes[sub].deps;
        while let Some(link) = cursor {
            if self.links[link].dep == dep {
                return Some(link);
            }
            if link == tail {
                break;
            }
            cursor = self.links[link].next_dep;
        }
        None
    }

    fn link_new(
        &mut self,
        dep: NodeId,
        sub: NodeId,
        next: Option<LinkId>,
        tail: Option<LinkId>,
    ) -> LinkId {
        let prev_sub = self.nodes[dep].subs_tail;
        let id = self.links.insert(Link {
            dep,
            sub,
            prev_sub,
            next_sub: None,
            prev_dep: tail,
            next_dep: next,
        });

        match prev_sub {
            Some(prev) => self.links[prev].next_sub = Some(id),
            None => self.nodes[dep].subs = Some(id),
        }
        self.nodes[dep].subs_tail = Some(id);

        match tail {
            Some(tail) => self.links[tail].next_dep = Some(id),
            None => self.nodes[sub].deps = Some(id),
        }
        if let Some(next) = next {
            self.links[next].prev_dep = Some(id);
        }
        self.nodes[sub].deps_tail = Some(id);

        tracing::trace!(?dep, ?sub, "new link");
        id
    }

    /// Remove a link from both of its lists.
    ///
    /// Returns the dependency if its subscriber list is now empty.
    fn unlink(&mut self, id: LinkId) -> Option<NodeId> {
        let link = self.links.remove(id)?;

        match link.prev_sub {
            Some(prev) => self.links[prev].next_sub = link.next_sub,
            None => {
                if let Some(dep) = self.nodes.get_mut(link.dep) {
                    dep.subs = link.next_sub;
                }
            }
        }
        match link.next_sub {
            Some(next) => self.links[next].prev_sub = link.prev_sub,
            None => {
                if let Some(dep) = self.nodes.get_mut(link.dep) {
                    dep.subs_tail = link.prev_sub;
                }
            }
        }

        match link.prev_dep {
            Some(prev) => self.links[prev].next_dep = link.next_dep,
            None => {
                if let Some(sub) = self.nodes.get_mut(link.sub) {
                    sub.deps = link.next_dep;
                }
            }
        }
        if let Some(next) = link.next_dep {
            self.links[next].prev_dep = link.prev_dep;
        }
        if let Some(sub) = self.nodes.get_mut(link.sub) {
            if sub.deps_tail == Some(id) {
                sub.deps_tail = link.prev_dep;
            }
        }

        match self.nodes.get(link.dep) {
            Some(dep) if dep.subs.is_none() => Some(link.dep),
            _ => None,
        }
    }

    /// Begin a tracking pass for `sub`.
    pub fn start_tracking(&mut self, sub: NodeId) {
        if let Some(node) = self.nodes.get_mut(sub) {
            node.deps_tail = None;
            node.flags.remove(
                SubscriberFlags::DIRTY
                    | SubscriberFlags::PENDING_COMPUTED
                    | SubscriberFlags::RECURSED,
            );
            node.flags.insert(SubscriberFlags::TRACKING);
        }
    }

    /// Finish a tracking pass for `sub`, unlinking every stale dependency.
    ///
    /// Returns the dependencies left without subscribers.
    pub fn end_tracking(&mut self, sub: NodeId) -> Orphans {
        let mut orphans = Orphans::new();
        let Some(node) = self.nodes.get(sub) else {
            return orphans;
        };

        let mut stale = match node.deps_tail {
            Some(tail) => self.links[tail].next_dep,
            None => node.deps,
        };
        while let Some(link) = stale {
            stale = self.links[link].next_dep;
            if let Some(dep) = self.unlink(link) {
                orphans.push(dep);
            }
        }

        if let Some(node) = self.nodes.get_mut(sub) {
            node.flags.remove(SubscriberFlags::TRACKING);
        }
        orphans
    }

    /// Mark everything downstream of `sources` and collect the effects to
    /// notify.
    ///
    /// Direct subscribers become `DIRTY`; subscribers reached through a
    /// derived node become `PENDING_COMPUTED`. Derived nodes are walked, not
    /// notified. Subscribers in a tracking pass are skipped.
    pub fn propagate(&mut self, sources: &[NodeId]) -> SmallVec<[NodeId; 8]> {
        let mut effects = SmallVec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(NodeId, bool)> =
            sources.iter().map(|&source| (source, true)).collect();

        while let Some((dep, direct)) = queue.pop_front() {
            let mut cursor = self.nodes.get(dep).and_then(|n| n.subs);
            while let Some(link) = cursor {
                let sub = self.links[link].sub;
                cursor = self.links[link].next_sub;

                let Some(node) = self.nodes.get_mut(sub) else {
                    continue;
                };
                if node.is_tracking() {
                    node.flags.insert(SubscriberFlags::RECURSED);
                    continue;
                }
                node.flags.insert(if direct {
                    SubscriberFlags::DIRTY
                } else {
                    SubscriberFlags::PENDING_COMPUTED
                });

                if !visited.insert(sub) {
                    continue;
                }
                if node.is_computed() {
                    queue.push_back((sub, false));
                } else if node.is_effect() {
                    effects.push(sub);
                }
            }
        }

        tracing::trace!(sources = sources.len(), effects = effects.len(), "propagated");
        effects
    }

    /// Promote `PENDING_COMPUTED` subscribers of `dep` to `DIRTY`.
    ///
    /// Called after a derived node recomputed to a new value.
    pub fn mark_subscribers_dirty(&mut self, dep: NodeId) {
        let mut cursor = self.nodes.get(dep).and_then(|n| n.subs);
        while let Some(link) = cursor {
            let sub = self.links[link].sub;
            cursor = self.links[link].next_sub;
            if let Some(node) = self.nodes.get_mut(sub) {
                if node.is_pending() {
                    node.flags.insert(SubscriberFlags::DIRTY);
                }
            }
        }
    }
}
