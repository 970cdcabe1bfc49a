//! Error types for the concurrency layer.

use calsync_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Result type for concurrency operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the concurrency layer itself.
///
/// Failures of a wrapped operation are never converted into this type; they
/// propagate as the operation's own error. Entry points that are generic
/// over the caller's error type inject these variants through `From`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The lock could not be acquired before the timeout elapsed.
    #[error("lock unavailable: {key} (waited {timeout:?})")]
    LockUnavailable {
        /// Lock key.
        key: String,
        /// How long acquisition was attempted.
        timeout: Duration,
    },

    /// The backing store failed outside of an acquisition loop.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A debounced key is already in flight with a different result type.
    #[error("debounced operation '{key}' is in flight with a different result type")]
    DebounceTypeMismatch {
        /// Debounce key.
        key: String,
    },

    /// A debounced operation panicked before producing a result.
    #[error("debounced operation '{key}' was abandoned")]
    DebounceAbandoned {
        /// Debounce key.
        key: String,
    },
}

impl CoreError {
    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::LockUnavailable { .. } => true,
            CoreError::Store(e) => e.is_transient(),
            CoreError::DebounceTypeMismatch { .. } => false,
            CoreError::DebounceAbandoned { .. } => true,
        }
    }

    /// Returns a message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            CoreError::LockUnavailable { .. } => {
                "This item is being changed somewhere else. Please try again."
            }
            CoreError::Store(_)
            | CoreError::DebounceTypeMismatch { .. }
            | CoreError::DebounceAbandoned { .. } => {
                "Something went wrong. Please try again later."
            }
        }
    }
}
