//! Configuration for the sync engine.

use calsync_protocol::ConflictStrategy;
use std::time::Duration;

/// Configuration for a sync session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// User whose calendar this session mirrors.
    pub user_id: String,
    /// Interval between timer-driven passes.
    pub poll_interval: Duration,
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
    /// Strategy used to reconcile local edits with server copies.
    pub conflict_strategy: ConflictStrategy,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            poll_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(15),
            conflict_strategy: ConflictStrategy::default(),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Sets the conflict strategy.
    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}
