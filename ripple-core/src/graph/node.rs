//! Graph Nodes
//!
//! This module defines the records that live in the dependency graph arena:
//! nodes (which may act as a dependency, a subscriber, or both) and the
//! links connecting them.

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a node in the dependency graph.
    pub struct NodeId;

    /// Unique identifier for a link (edge) in the dependency graph.
    pub struct LinkId;
}

bitflags::bitflags! {
    /// Status bits of a subscriber node.
    ///
    /// Every bit is independently observable through a predicate on
    /// [`Node`] so callers never have to test masks by hand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubscriberFlags: u8 {
        /// The node is a derived value (memo).
        const COMPUTED         = 0b0000_0001;
        /// The node is an effect.
        const EFFECT           = 0b0000_0010;
        /// A tracking pass is running for this node.
        const TRACKING         = 0b0000_0100;
        /// Propagation reached the node while it was tracking.
        const RECURSED         = 0b0000_1000;
        /// A direct dependency changed; the node must recompute.
        const DIRTY            = 0b0001_0000;
        /// An upstream derived value may have changed; pull before deciding.
        const PENDING_COMPUTED = 0b0010_0000;
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A pure dependency: a signal or an observed property.
    Source,

    /// A memo. Depends on other nodes and is depended upon.
    Derived,

    /// An effect. Only ever a subscriber.
    Effect,
}

/// A node in the dependency graph.
///
/// The dependency side holds the list of links to subscribers; the subscriber
/// side holds the list of links to dependencies. Sources only use the former,
/// effects only the latter, memos both.
#[derive(Debug)]
pub struct Node {
    kind: NodeKind,
    pub(crate) flags: SubscriberFlags,

    pub(crate) subs: Option<LinkId>,
    pub(crate) subs_tail: Option<LinkId>,

    pub(crate) deps: Option<LinkId>,
    pub(crate) deps_tail: Option<LinkId>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            flags: match kind {
                NodeKind::Source => SubscriberFlags::empty(),
                // Start dirty to ensure first computation
                NodeKind::Derived => SubscriberFlags::COMPUTED | SubscriberFlags::DIRTY,
                NodeKind::Effect => SubscriberFlags::EFFECT,
            },
            subs: None,
            subs_tail: None,
            deps: None,
            deps_tail: None,
        }
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Get the raw flag set.
    pub fn flags(&self) -> SubscriberFlags {
        self.flags
    }

    /// Whether the node is a memo.
    pub fn is_computed(&self) -> bool {
        self.flags.contains(SubscriberFlags::COMPUTED)
    }

    /// Whether the node is an effect.
    pub fn is_effect(&self) -> bool {
        self.flags.contains(SubscriberFlags::EFFECT)
    }

    /// Whether a tracking pass is collecting this node's reads.
    pub fn is_tracking(&self) -> bool {
        self.flags.contains(SubscriberFlags::TRACKING)
    }

    /// Whether the node was notified during its own tracking pass.
    pub fn is_recursed(&self) -> bool {
        self.flags.contains(SubscriberFlags::RECURSED)
    }

    /// Whether a direct dependency changed.
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(SubscriberFlags::DIRTY)
    }

    /// Whether a memo this node reads through may have changed.
    pub fn is_pending(&self) -> bool {
        self.flags.contains(SubscriberFlags::PENDING_COMPUTED)
    }

    /// Whether any subscriber currently links to this node.
    pub fn has_subscribers(&self) -> bool {
        self.subs.is_some()
    }

    /// Whether this node currently links to any dependency.
    pub fn has_dependencies(&self) -> bool {
        self.deps.is_some()
    }
}

/// A single dependency/subscriber edge.
///
/// Each link sits in two lists at once: the dependency's subscriber list
/// (`prev_sub`/`next_sub`) and the subscriber's dependency list
/// (`prev_dep`/`next_dep`).
#[derive(Debug, Clone)]
pub struct Link {
    pub(crate) dep: NodeId,
    pub(crate) sub: NodeId,
    pub(crate) prev_sub: Option<LinkId>,
    pub(crate) next_sub: Option<LinkId>,
    pub(crate) prev_dep: Option<LinkId>,
    pub(crate) next_dep: Option<LinkId>,
}

impl Link {
    pub fn dep(&self) -> NodeId {
        self.dep
    }

    pub fn sub(&self) -> NodeId {
        self.sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_node_starts_clean() {
        let node = Node::new(NodeKind::Source);
        assert_eq!(node.kind(), NodeKind::Source);
        assert!(node.flags().is_empty());
        assert!(!node.has_subscribers());
    }

    #[test]
    fn derived_node_starts_dirty() {
        let node = Node::new(NodeKind::Derived);
        assert_eq!(node.kind(), NodeKind::Derived);
        assert!(node.is_computed());
        assert!(node.is_dirty());
        assert!(!node.is_effect());
    }

    #[test]
    fn effect_node_starts_clean() {
        let node = Node::new(NodeKind::Effect);
        assert!(node.is_effect());
        assert!(!node.is_dirty());
        assert!(!node.is_tracking());
    }

    #[test]
    fn flag_predicates_are_independent() {
        let mut node = Node::new(NodeKind::Effect);

        node.flags |= SubscriberFlags::TRACKING | SubscriberFlags::RECURSED;
        assert!(node.is_tracking());
        assert!(node.is_recursed());
        assert!(!node.is_pending());

        node.flags.remove(SubscriberFlags::TRACKING);
        assert!(!node.is_tracking());
        assert!(node.is_recursed());
    }
}
