//! Ripple Core
//!
//! This crate provides the reactive core of the Ripple UI framework.
//! It implements:
//!
//! - A link graph of dependencies and subscribers with incremental,
//!   per-pass dependency tracking
//! - Reactive primitives (signals, memos, effects)
//! - Observed objects with per-property dependency tracking
//! - Watchers with configurable traversal depth
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: Node and link arena, propagation, and the job queue
//! - `reactive`: Runtime, primitives, property store and watchers
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{Effect, Memo, Signal};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! // Create a signal
//! let count = Signal::new(1);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     Memo::new(move || count.get() * 2)
//! };
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0));
//! let _effect = {
//!     let (doubled, seen) = (doubled.clone(), seen.clone());
//!     Effect::new(move || seen.set(doubled.get()))
//! };
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically ran
//! assert_eq!(seen.get(), 10);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::{ReactiveError, Result};
