//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a key/value store.
///
/// Store errors are cloneable so that a single failure can be reported to
/// every caller sharing the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the command.
    #[error("store command failed: {0}")]
    Command(String),

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Returns true if the same command may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Command(_))
    }
}
