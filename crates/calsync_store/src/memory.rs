//! In-memory key/value store with expiry.

use crate::backend::KeyValueStore;
use crate::clock::instant_after;
use crate::error::StoreResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Record {
    value: String,
    expires_at: Instant,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// An in-memory key/value store.
///
/// This store keeps every record in a single map and is suitable for:
/// - Unit and integration tests
/// - Demos and the command-line tools
/// - Single-process deployments where every worker shares one `Arc`
///
/// Expired records are evicted lazily on access, or eagerly with
/// [`InMemoryStore::purge_expired`]. Time is read from `tokio::time`, so a
/// paused test clock also drives expiry.
///
/// # Thread Safety
///
/// All operations take one short critical section; `set_if_absent` is
/// atomic with respect to every other operation on the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, Record>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records.lock().values().filter(|r| r.is_live(now)).count()
    }

    /// Returns true if the store holds no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| r.is_live(now));
        before - records.len()
    }

    /// Returns the remaining time to live of `key`, if it is live.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.records
            .lock()
            .get(key)
            .filter(|r| r.is_live(now))
            .map(|r| r.expires_at - now)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut records = self.records.lock();
        match records.get(key) {
            Some(record) if record.is_live(now) => Ok(Some(record.value.clone())),
            Some(_) => {
                records.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let record = Record {
            value: value.to_owned(),
            expires_at: instant_after(Instant::now(), ttl),
        };
        self.records.lock().insert(key.to_owned(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .records
            .lock()
            .remove(key)
            .is_some_and(|r| r.is_live(now)))
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut records = self.records.lock();
        if records.get(key).is_some_and(|r| r.is_live(now)) {
            return Ok(false);
        }
        records.insert(
            key.to_owned(),
            Record {
                value: value.to_owned(),
                expires_at: instant_after(now, ttl),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn memory_unbounded_ttl() {
        let store = InMemoryStore::new();
        store.set("k", "v", Duration::MAX).await.unwrap();
        assert!(store.set_if_absent("other", "v", Duration::MAX).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_set_then_get() {
        let store = InMemoryStore::new();
        store.set("k", "v1", TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));

        store.set("k", "v2", TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn memory_delete_reports_removal() {
        let store = InMemoryStore::new();
        store.set("k", "v", TTL).await.unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_set_if_absent_only_writes_once() {
        let store = InMemoryStore::new();
        assert!(store.set_if_absent("k", "first", TTL).await.unwrap());
        assert!(!store.set_if_absent("k", "second", TTL).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn memory_records_expire() {
        let store = InMemoryStore::new();
        store.set("k", "v", Duration::from_millis(100)).await.unwrap();
        assert!(store.ttl("k").is_some());

        tokio::time::advance(Duration::from_millis(101)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.ttl("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn memory_set_if_absent_replaces_expired_record() {
        let store = InMemoryStore::new();
        store.set("k", "stale", Duration::from_millis(50)).await.unwrap();

        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(store.set_if_absent("k", "fresh", TTL).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn memory_purge_expired() {
        let store = InMemoryStore::new();
        store.set("short", "v", Duration::from_millis(10)).await.unwrap();
        store.set("long", "v", TTL).await.unwrap();

        tokio::time::advance(Duration::from_millis(20)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_delete_of_expired_record_reports_false() {
        let store = InMemoryStore::new();
        store.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(!store.delete("k").await.unwrap());
    }
}
