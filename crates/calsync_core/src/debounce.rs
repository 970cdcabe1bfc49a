//! De-duplication of identical in-flight requests.

use crate::error::CoreError;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Slot {
    generation: u64,
    future: Box<dyn Any + Send + Sync>,
}

/// Collapses concurrent calls with the same key into one execution.
///
/// The first caller for a key starts the operation; every caller that
/// arrives while it is in flight, or within `ttl` after it settles, awaits
/// the same shared result instead of re-issuing it. The entry evicts itself
/// `ttl` after the operation settles.
///
/// The operation is driven by a background task, so it runs to completion
/// even if every caller stops waiting. If it panics, every waiter receives
/// [`CoreError::DebounceAbandoned`].
#[derive(Default)]
pub struct DebounceCache {
    entries: Arc<Mutex<HashMap<String, Slot>>>,
    next_generation: AtomicU64,
}

impl DebounceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached entries (in flight or settling).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `operation` under `key`, or joins the run already cached there.
    ///
    /// Every joined caller receives a clone of the same result. A key that
    /// is cached with a different result type yields
    /// [`CoreError::DebounceTypeMismatch`].
    pub async fn run<F, Fut, T, E>(&self, key: &str, ttl: Duration, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + From<CoreError> + 'static,
    {
        let (shared, started) = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(slot) => match slot.future.downcast_ref::<SharedResult<T, E>>() {
                    Some(shared) => {
                        debug!(key, "joining in-flight request");
                        (shared.clone(), None)
                    }
                    None => {
                        return Err(CoreError::DebounceTypeMismatch {
                            key: key.to_owned(),
                        }
                        .into())
                    }
                },
                None => {
                    // Reserve the key with a future fed by a channel, so the
                    // operation is built without holding the entries lock.
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = oneshot::channel::<Result<T, E>>();
                    let abandoned_key = key.to_owned();
                    let shared: SharedResult<T, E> = async move {
                        match rx.await {
                            Ok(result) => result,
                            Err(_) => Err(CoreError::DebounceAbandoned {
                                key: abandoned_key,
                            }
                            .into()),
                        }
                    }
                    .boxed()
                    .shared();
                    entries.insert(
                        key.to_owned(),
                        Slot {
                            generation,
                            future: Box::new(shared.clone()),
                        },
                    );
                    (shared, Some((tx, generation)))
                }
            }
        };

        if let Some((tx, generation)) = started {
            debug!(key, "starting debounced request");
            self.schedule_eviction(key.to_owned(), generation, ttl, shared.clone());
            let pending = operation();
            tokio::spawn(async move {
                let _ = tx.send(pending.await);
            });
        }
        shared.await
    }

    fn schedule_eviction<T, E>(
        &self,
        key: String,
        generation: u64,
        ttl: Duration,
        settled: SharedResult<T, E>,
    ) where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            let _ = settled.await;
            tokio::time::sleep(ttl).await;
            let mut entries = entries.lock();
            if entries.get(&key).is_some_and(|slot| slot.generation == generation) {
                entries.remove(&key);
                debug!(key = %key, "debounced request evicted");
            }
        });
    }
}

impl std::fmt::Debug for DebounceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_execution() {
        let cache = DebounceCache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let callers = (0..10).map(|_| {
            let runs = Arc::clone(&runs);
            cache.run("free-busy:alice", TTL, move || async move {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, CoreError>(format!("result-{run}"))
            })
        });
        let results = futures::future::join_all(callers).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        for result in &results {
            assert_eq!(result.as_deref(), Ok("result-0"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shared_too() {
        let cache = DebounceCache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let call = || {
            let runs = Arc::clone(&runs);
            cache.run("k", TTL, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err::<u32, _>(CoreError::DebounceTypeMismatch { key: "inner".into() })
            })
        };
        let (a, b) = tokio::join!(call(), call());

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(a.is_err());
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_evicts_after_ttl() {
        let cache = DebounceCache::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let call = |runs: Arc<AtomicUsize>| {
            cache.run("k", TTL, move || async move {
                Ok::<_, CoreError>(runs.fetch_add(1, Ordering::SeqCst))
            })
        };

        assert_eq!(call(Arc::clone(&runs)).await, Ok(0));
        // Within the window the settled result is reused.
        tokio::time::sleep(TTL / 2).await;
        assert_eq!(call(Arc::clone(&runs)).await, Ok(0));
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(TTL).await;
        assert!(cache.is_empty());
        assert_eq!(call(Arc::clone(&runs)).await, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_independently() {
        let cache = DebounceCache::new();
        let a = cache.run("a", TTL, || async { Ok::<_, CoreError>(1) });
        let b = cache.run("b", TTL, || async { Ok::<_, CoreError>(2) });
        assert_eq!(tokio::join!(a, b), (Ok(1), Ok(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn operation_may_inspect_the_cache() {
        let cache = DebounceCache::new();
        let seen = cache
            .run("k", TTL, || {
                let entries = cache.len();
                async move { Ok::<_, CoreError>(entries) }
            })
            .await;
        assert_eq!(seen, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_operation_is_reported_to_waiters() {
        let cache = DebounceCache::new();
        let result = cache
            .run("k", TTL, || async {
                let crashed = true;
                assert!(!crashed, "operation crashed");
                Ok::<u32, CoreError>(0)
            })
            .await;
        assert_eq!(result, Err(CoreError::DebounceAbandoned { key: "k".into() }));
    }

    #[tokio::test(start_paused = true)]
    async fn type_mismatch_is_reported() {
        let cache = DebounceCache::new();
        assert_eq!(
            cache
                .run("k", TTL, || async { Ok::<u32, CoreError>(7) })
                .await,
            Ok(7)
        );

        let other: Result<String, CoreError> = cache
            .run("k", TTL, || async { Ok("text".to_string()) })
            .await;
        assert_eq!(
            other,
            Err(CoreError::DebounceTypeMismatch { key: "k".into() })
        );
    }
}
