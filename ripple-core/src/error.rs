//! Error types for the reactive runtime.
//!
//! Nothing in the runtime is fatal. Misuse is reported through these
//! variants (and a `tracing` warning) while the offending write is dropped.

use thiserror::Error;

use crate::graph::NodeId;
use crate::reactive::PropKey;

/// Errors returned by reactive primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReactiveError {
    /// A memo without a setter was written to.
    #[error("write to memo {0:?} dropped: memo is read-only")]
    ReadonlyMemo(NodeId),

    /// A length operation was applied to something that is not an array.
    #[error("target is not an array")]
    NotAnArray,

    /// An array length (or the length an index write would need) is
    /// negative, fractional or above `MAX_ARRAY_LENGTH`.
    #[error("invalid array length {0}")]
    InvalidLength(f64),

    /// The key cannot address a property of this kind of target.
    #[error("key {key} cannot be written on {kind} target")]
    InvalidKey {
        /// The rejected key.
        key: PropKey,
        /// "array" or "object".
        kind: &'static str,
    },
}

/// Result type for reactive operations.
pub type Result<T> = std::result::Result<T, ReactiveError>;
