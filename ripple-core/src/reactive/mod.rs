//! Reactive Primitives
//!
//! This module implements the reactive system on top of the link graph:
//! signals, memos, effects, observed objects and watchers.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal links
//! itself to that context. When the signal's value changes, every linked
//! subscriber is notified.
//!
//! ## Observed objects
//!
//! An [`Observed`] object tracks each property separately. Reading `a.x`
//! links the reader to `x` only; writing `a.y` leaves it alone. Nodes for
//! properties live in a store keyed by target and property and disappear when
//! nobody reads them anymore.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates lazily,
//! on the next read after one of its dependencies changed, and subscribers
//! behind it only re-run when its value actually changed.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Its scheduler decides when; a render loop swaps it
//! for a queue.
//!
//! ## Watchers
//!
//! [`watch`] calls back with the new and old value of a source, optionally
//! traversing it deeply.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal or property is read, we check if there
//! is an active subscriber and, if so, link the dependency to it. Every
//! tracking pass reuses the links of the previous pass in read order and
//! drops the ones that were not read again.

mod context;
mod effect;
mod memo;
mod observed;
mod runtime;
mod signal;
mod store;
mod watch;

pub use context::{untracked, ReactiveContext};
pub use effect::{Effect, Stop};
pub use memo::{Memo, MemoState};
pub use observed::{
    boxed, is_boxed, is_observed, observe, to_ref, to_refs, unwrap_boxed, FieldRef, Object,
    Observed, Value, MAX_ARRAY_LENGTH,
};
pub use runtime::{Reactive, Runtime, TrackingScope};
pub use signal::Signal;
pub use store::{dependency, is_tracked, track, trigger, PropKey, Shape, TargetId, TriggerOp};
pub use watch::{watch, Deep, OnCleanup, Seen, Traverse, WatchHandle, WatchOptions, WatchSource};
