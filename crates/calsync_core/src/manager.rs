//! Catalog of named critical sections.

use crate::config::{LockOptions, ManagerConfig};
use crate::debounce::DebounceCache;
use crate::error::CoreError;
use crate::keys::LockKey;
use crate::mutex::DistributedMutex;
use crate::semaphore::Semaphore;
use calsync_store::KeyValueStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Point-in-time view of the manager's process-local primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyStats {
    /// Free AI call permits.
    pub ai_available: usize,
    /// Free external API permits.
    pub api_available: usize,
    /// Free batch job permits.
    pub batch_available: usize,
    /// Debounce entries in flight or settling.
    pub debounce_entries: usize,
}

/// Maps business operations onto pre-configured locks and semaphores.
///
/// Build one manager at process start and share it (it is cheap to wrap in
/// an `Arc`). Lock-based sections serialize across every worker sharing the
/// store; semaphore and debounce sections only bound this process.
///
/// Lock-based entry points are generic over the operation's error type
/// `E: From<CoreError>`: the operation's own failure propagates unchanged
/// and a lock timeout arrives as `CoreError::LockUnavailable` converted
/// into `E`.
pub struct ConcurrencyManager<S: KeyValueStore + ?Sized> {
    config: ManagerConfig,
    mutex: DistributedMutex<S>,
    ai: Semaphore,
    api: Semaphore,
    batch: Semaphore,
    debounce: DebounceCache,
}

impl<S: KeyValueStore + ?Sized> ConcurrencyManager<S> {
    /// Creates a manager over `store` with the given catalog configuration.
    pub fn new(store: Arc<S>, config: ManagerConfig) -> Self {
        info!(
            ai_permits = config.ai_permits,
            api_permits = config.api_permits,
            batch_permits = config.batch_permits,
            "concurrency manager ready"
        );
        Self {
            mutex: DistributedMutex::new(store),
            ai: Semaphore::new("ai-call", config.ai_permits),
            api: Semaphore::new("calendar-api", config.api_permits),
            batch: Semaphore::new("batch", config.batch_permits),
            debounce: DebounceCache::new(),
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the underlying distributed mutex.
    pub fn mutex(&self) -> &DistributedMutex<S> {
        &self.mutex
    }

    /// Runs `operation` while holding the edit lock of one event.
    ///
    /// Prevents read-modify-write races when the same event is edited from
    /// two surfaces at once (for example the UI and an AI action).
    pub async fn with_event_lock<F, Fut, T, E>(
        &self,
        user_id: &str,
        event_id: &str,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let key = LockKey::event(user_id, event_id);
        self.with_lock(&key, &self.config.event_lock, operation)
            .await
    }

    /// Runs `operation` while holding the user's calendar sync lock, so only
    /// one full sync pass per user runs at a time.
    pub async fn with_calendar_sync<F, Fut, T, E>(&self, user_id: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let key = LockKey::calendar_sync(user_id);
        self.with_lock(&key, &self.config.calendar_sync_lock, operation)
            .await
    }

    /// Runs `operation` while holding the lock of the unordered user pair.
    ///
    /// Two simultaneous requests between the same pair, in either direction,
    /// are serialized so they cannot both create a relationship.
    pub async fn with_friend_request<F, Fut, T, E>(
        &self,
        user_id: &str,
        friend_id: &str,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let key = LockKey::friend_request(user_id, friend_id);
        self.with_lock(&key, &self.config.friend_request_lock, operation)
            .await
    }

    /// Runs `operation` under an ad-hoc lock key.
    pub async fn with_lock<F, Fut, T, E>(
        &self,
        key: &LockKey,
        options: &LockOptions,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        self.mutex.with_lock(key.as_str(), options, operation).await
    }

    /// Runs `operation` under the AI call semaphore.
    pub async fn with_ai_limit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.ai.with_permit(operation).await
    }

    /// Runs `operation` under the external calendar API semaphore.
    pub async fn with_api_limit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.api.with_permit(operation).await
    }

    /// Runs `operation` under the batch job semaphore.
    pub async fn with_batch_limit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.batch.with_permit(operation).await
    }

    /// Shares one execution of `operation` among all callers using `key`
    /// until `ttl` after it settles.
    pub async fn with_debounce<F, Fut, T, E>(
        &self,
        key: &str,
        operation: F,
        ttl: Duration,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + From<CoreError> + 'static,
    {
        self.debounce.run(key, ttl, operation).await
    }

    /// Returns a snapshot of the process-local primitives.
    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            ai_available: self.ai.available(),
            api_available: self.api.available(),
            batch_available: self.batch.available(),
            debounce_entries: self.debounce.len(),
        }
    }
}
