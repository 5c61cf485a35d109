//! Property Dependency Store
//!
//! Maps an observed target and property key to the graph node that stands
//! for that property. Nodes are created on the first tracked read and
//! released as soon as their last subscriber goes away, so the store only
//! ever holds properties somebody is watching.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::{try_with_state, with_state, Runtime};
use crate::graph::{NodeId, NodeKind};

/// Identity of an observed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// A property of an observed target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    /// An array element.
    Index(usize),
    /// A named object field.
    Field(Rc<str>),
    /// The length of an array.
    Length,
    /// The key set of an object, read by iteration.
    Keys,
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Index(index) => write!(f, "[{index}]"),
            PropKey::Field(name) => write!(f, ".{name}"),
            PropKey::Length => f.write_str(".length"),
            PropKey::Keys => f.write_str("<keys>"),
        }
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        PropKey::Index(index)
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        PropKey::Field(name.into())
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::Field(name.into())
    }
}

/// Shape of an observed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Array,
    Object,
}

/// Kind of mutation reported to [`trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// An existing property changed value.
    Set,
    /// A property was created.
    Add,
    /// A property was removed.
    Delete,
}

#[derive(Debug, Default)]
pub(crate) struct DepStore {
    targets: HashMap<TargetId, IndexMap<PropKey, NodeId>>,
    origins: SecondaryMap<NodeId, (TargetId, PropKey)>,
}

impl DepStore {
    pub(crate) fn node(&self, target: TargetId, key: &PropKey) -> Option<NodeId> {
        self.targets.get(&target)?.get(key).copied()
    }

    fn insert(&mut self, target: TargetId, key: PropKey, node: NodeId) {
        self.origins.insert(node, (target, key.clone()));
        self.targets.entry(target).or_default().insert(key, node);
    }

    /// Drop the store entry of `node`. Returns false if it is not a store node.
    pub(crate) fn forget_node(&mut self, node: NodeId) -> bool {
        let Some((target, key)) = self.origins.remove(node) else {
            return false;
        };
        if let Some(props) = self.targets.get_mut(&target) {
            props.shift_remove(&key);
            if props.is_empty() {
                self.targets.remove(&target);
            }
        }
        true
    }

    /// Drop every entry of `target`, returning the nodes it owned.
    pub(crate) fn forget_target(&mut self, target: TargetId) -> Vec<NodeId> {
        let nodes: Vec<NodeId> = self
            .targets
            .remove(&target)
            .map(|props| props.into_values().collect())
            .unwrap_or_default();
        for &node in &nodes {
            self.origins.remove(node);
        }
        nodes
    }
}

/// Record that the active subscriber read `key` of `target`.
///
/// No-op when no subscriber is active.
pub fn track(target: TargetId, key: PropKey) {
    let Some(sub) = ReactiveContext::current_subscriber() else {
        return;
    };
    with_state(|state| {
        let node = match state.store.node(target, &key) {
            Some(node) => node,
            None => {
                let node = state.graph.insert(NodeKind::Source);
                state.store.insert(target, key, node);
                node
            }
        };
        state.graph.link(node, sub);
    });
}

/// Report a mutation of `key` on `target`.
///
/// `new_length` is the array length after the write and is only consulted
/// when an array's [`PropKey::Length`] is set directly.
pub fn trigger(
    target: TargetId,
    shape: Shape,
    op: TriggerOp,
    key: &PropKey,
    new_length: Option<usize>,
) {
    let sources: SmallVec<[NodeId; 4]> = with_state(|state| {
        let mut sources = SmallVec::new();
        let Some(props) = state.store.targets.get(&target) else {
            return sources;
        };

        if shape == Shape::Array && *key == PropKey::Length {
            // Shrinking must reach readers of every index that is now gone.
            let new_length = new_length.unwrap_or(0);
            for (prop, &node) in props {
                match prop {
                    PropKey::Length => sources.push(node),
                    PropKey::Index(index) if *index >= new_length => sources.push(node),
                    _ => {}
                }
            }
            return sources;
        }

        sources.extend(props.get(key).copied());
        match (op, shape) {
            (TriggerOp::Add, Shape::Array) if matches!(key, PropKey::Index(_)) => {
                sources.extend(props.get(&PropKey::Length).copied());
            }
            (TriggerOp::Add | TriggerOp::Delete, Shape::Object) => {
                sources.extend(props.get(&PropKey::Keys).copied());
            }
            _ => {}
        }
        sources
    });

    Runtime::propagate(&sources);
}

/// Forget every tracked property of `target`, detaching its subscribers.
///
/// Called when the target itself is dropped.
pub(crate) fn release_target(target: TargetId) {
    try_with_state(|state| {
        for node in state.store.forget_target(target) {
            state.graph.remove(node);
        }
    });
}

/// Whether any property of `target` is currently tracked.
pub fn is_tracked(target: TargetId) -> bool {
    with_state(|state| state.store.targets.contains_key(&target))
}

/// The graph node of a tracked property, if any.
pub fn dependency(target: TargetId, key: &PropKey) -> Option<NodeId> {
    with_state(|state| state.store.node(target, key))
}
