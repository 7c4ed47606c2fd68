//! Recoverable error types.

use thiserror::Error;

/// Recoverable memory-layer failure.
///
/// Exhaustion is never reported here; it is fatal (see [`crate::Fatal`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemError {
    /// A growable buffer was asked to hold more than the policy maximum.
    #[error(
        "string limit reached: {requested} elements of {element_size} bytes exceed {maximum_bytes} bytes"
    )]
    LimitReached {
        requested: usize,
        element_size: usize,
        maximum_bytes: usize,
    },
    /// The grow policy itself is unusable.
    #[error("invalid grow policy: {0}")]
    InvalidPolicy(#[from] ConfigError),
}

/// Invalid system configuration, reported when a context is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("grow policy initial size must be non-zero")]
    ZeroInitialSize,
    #[error("grow policy initial size {initial_bytes} exceeds maximum {maximum_bytes}")]
    InitialExceedsMaximum {
        initial_bytes: usize,
        maximum_bytes: usize,
    },
}
