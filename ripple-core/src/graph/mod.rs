//! Dependency Graph
//!
//! This module implements the link graph that connects dependencies
//! (signals, observed properties, memos) to their subscribers (memos,
//! effects).
//!
//! # Overview
//!
//! The graph is cyclic by construction: every link is reachable from both
//! its dependency and its subscriber. We keep nodes and links in slot-map
//! arenas and reference them by key, so neither side owns the other.
//!
//! - A node's dependency side is a doubly linked list of links to its
//!   subscribers, in link order.
//! - A node's subscriber side is a doubly linked list of links to its
//!   dependencies, in read order.
//!
//! # Design Decisions
//!
//! 1. Links are matched by position between tracking passes, so a
//!    computation that reads the same things in the same order allocates
//!    nothing when it re-runs.
//!
//! 2. Propagation is push for invalidation and pull for recomputation:
//!    derived nodes are only marked, and recompute when read.
//!
//! 3. The graph never runs user code. It reports which effects to notify
//!    and which dependencies lost their last subscriber; the runtime acts on
//!    both after releasing its borrow.

mod arena;
mod node;
mod scheduler;

pub use arena::{Graph, Orphans};
pub use node::{Link, LinkId, Node, NodeId, NodeKind, SubscriberFlags};
pub use scheduler::JobQueue;
