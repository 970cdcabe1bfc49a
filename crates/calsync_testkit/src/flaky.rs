//! Fault-injecting key/value store.

use async_trait::async_trait;
use calsync_store::{KeyValueStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Wraps a store and fails its first `n` calls with
/// [`StoreError::Unavailable`].
///
/// Use `u32::MAX` for a store that never recovers.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    remaining_failures: AtomicU32,
    injected: AtomicU32,
}

impl<S: KeyValueStore> FlakyStore<S> {
    /// Creates a store that fails the first `failures` calls.
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
            injected: AtomicU32::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Makes the next `failures` calls fail.
    pub fn fail_next(&self, failures: u32) {
        self.remaining_failures.store(failures, Ordering::SeqCst);
    }

    /// Returns how many calls have been failed so far.
    pub fn failures_injected(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    fn check(&self, op: &str) -> StoreResult<()> {
        let should_fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 {
                    None
                } else if n == u32::MAX {
                    Some(n)
                } else {
                    Some(n - 1)
                }
            })
            .is_ok();

        if should_fail {
            self.injected.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable(format!("injected failure on {op}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for FlakyStore<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check("get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check("set")?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check("delete")?;
        self.inner.delete(key).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.check("set_if_absent")?;
        self.inner.set_if_absent(key, value, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_store::InMemoryStore;

    #[tokio::test]
    async fn fails_then_recovers() {
        let store = FlakyStore::new(InMemoryStore::new(), 2);
        assert!(store.get("k").await.is_err());
        assert!(store.set("k", "v", Duration::from_secs(1)).await.is_err());
        assert!(store.set("k", "v", Duration::from_secs(1)).await.is_ok());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.failures_injected(), 2);
    }

    #[tokio::test]
    async fn max_never_recovers() {
        let store = FlakyStore::new(InMemoryStore::new(), u32::MAX);
        for _ in 0..5 {
            assert!(store.delete("k").await.is_err());
        }
        assert_eq!(store.failures_injected(), 5);
    }
}
