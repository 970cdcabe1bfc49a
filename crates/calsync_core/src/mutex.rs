//! Distributed mutex backed by a key/value store.

use crate::config::LockOptions;
use crate::error::CoreError;
use calsync_store::{instant_after, KeyValueStore, StoreResult};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Opaque token identifying one successful acquisition.
///
/// Only the holder of the token that wrote a lock record can remove it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// Generates a fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wraps an existing token value.
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named mutual-exclusion lock shared through a [`KeyValueStore`].
///
/// Acquisition is a bounded poll-and-backoff loop: conditional write, then
/// re-read to confirm this attempt's token won. The record expires after
/// the acquisition timeout, so a holder that crashes never blocks a key
/// forever.
///
/// # Invariants
///
/// - At most one live record exists per key, so at most one holder
/// - `release` removes the record only when presented with its token
/// - `acquire` never waits longer than `LockOptions::timeout`
pub struct DistributedMutex<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> Clone for DistributedMutex<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore + ?Sized> DistributedMutex<S> {
    /// Creates a mutex over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Acquires `key`, generating a token unless one is supplied.
    ///
    /// Returns the token on success, or `None` once `options.timeout` has
    /// elapsed. Store errors count as "not yet acquired" and are retried
    /// with backoff inside the same bound. Acquiring with a token that
    /// already holds the key succeeds immediately.
    pub async fn acquire(
        &self,
        key: &str,
        token: Option<LockToken>,
        options: &LockOptions,
    ) -> Option<LockToken> {
        let token = token.unwrap_or_else(LockToken::generate);
        let deadline = instant_after(Instant::now(), options.timeout);
        let mut failures = 0u32;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.try_acquire(key, &token, options).await {
                Ok(true) => {
                    debug!(key, attempts, "lock acquired");
                    return Some(token);
                }
                Ok(false) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!(key, failures, error = %e, "store error while acquiring lock");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(key, attempts, timeout = ?options.timeout, "lock acquisition timed out");
                return None;
            }
            sleep(options.delay_for_failures(failures).min(deadline - now)).await;
        }
    }

    async fn try_acquire(
        &self,
        key: &str,
        token: &LockToken,
        options: &LockOptions,
    ) -> StoreResult<bool> {
        self.store
            .set_if_absent(key, token.as_str(), options.timeout)
            .await?;
        // Stores without an atomic conditional write can let two writers
        // both think they won; only the value that stuck counts.
        Ok(self.store.get(key).await?.as_deref() == Some(token.as_str()))
    }

    /// Releases `key` if it is still held by `token`.
    ///
    /// Returns false when the record is gone or belongs to another holder,
    /// which happens when this holder's expiry elapsed first. That is not
    /// an error.
    pub async fn release(&self, key: &str, token: &LockToken) -> StoreResult<bool> {
        match self.store.get(key).await? {
            Some(current) if current == token.as_str() => {
                let removed = self.store.delete(key).await?;
                debug!(key, removed, "lock released");
                Ok(removed)
            }
            _ => {
                debug!(key, "release skipped, lock not held by this token");
                Ok(false)
            }
        }
    }

    /// Runs `operation` while holding `key`.
    ///
    /// The lock is released on every exit path, including when the
    /// operation fails or panics. If the lock cannot be acquired in time,
    /// the operation is not run and [`CoreError::LockUnavailable`] is
    /// returned through `E`.
    pub async fn with_lock<F, Fut, T, E>(
        &self,
        key: &str,
        options: &LockOptions,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let Some(token) = self.acquire(key, None, options).await else {
            return Err(CoreError::LockUnavailable {
                key: key.to_owned(),
                timeout: options.timeout,
            }
            .into());
        };

        let outcome = AssertUnwindSafe(operation()).catch_unwind().await;

        match self.release(key, &token).await {
            Ok(true) => {}
            Ok(false) => warn!(key, "lock expired before the critical section finished"),
            Err(e) => warn!(key, error = %e, "failed to release lock, leaving it to expire"),
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Returns true if `key` currently has a live holder.
    pub async fn is_locked(&self, key: &str) -> StoreResult<bool> {
        Ok(self.store.get(key).await?.is_some())
    }

    /// Returns the token value of the current holder, if any.
    pub async fn holder(&self, key: &str) -> StoreResult<Option<String>> {
        self.store.get(key).await
    }
}
