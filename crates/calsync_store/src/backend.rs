//! Key/value store trait definition.

use crate::error::StoreResult;
use async_trait::async_trait;
use std::time::Duration;

/// A shared, process-external key/value store with per-record expiry.
///
/// This is the only state the distributed lock layer shares between
/// workers, so it must behave the same for every caller that can reach it.
///
/// # Invariants
///
/// - `get` never returns a record whose expiry has elapsed
/// - `set` overwrites any existing record and restarts its expiry
/// - `delete` of a missing key is not an error
/// - A `set` is visible to a subsequent `get` on the same key
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and single-process use
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored at `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` at `key`, evicting it automatically after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or rejects the write.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Removes `key`. Returns true if a live record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Stores `value` at `key` only if no live record exists.
    ///
    /// Returns true if this call wrote the record. The provided
    /// implementation is a get followed by a set and is therefore racy;
    /// stores with a native conditional write should override it. Callers
    /// that need certainty re-read the key after a successful write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.set(key, value, ttl).await?;
        Ok(true)
    }
}
