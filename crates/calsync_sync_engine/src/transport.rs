//! Fetch abstraction for sync passes.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use calsync_protocol::CalendarEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Source of the authoritative event list.
///
/// The engine only needs the full current set for its user; how it is
/// obtained (HTTP polling, a push stream's latest snapshot, a file) is up
/// to the implementation.
#[async_trait]
pub trait EventFetcher: Send + Sync {
    /// Fetches the current full event list.
    async fn fetch_events(&self) -> SyncResult<Vec<CalendarEvent>>;
}

/// A scripted fetcher for testing.
#[derive(Debug, Default)]
pub struct MockFetcher {
    events: Mutex<Vec<CalendarEvent>>,
    failure: Mutex<Option<SyncError>>,
    delay: Mutex<Duration>,
    fetches: AtomicUsize,
}

impl MockFetcher {
    /// Creates a fetcher returning an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher returning `events`.
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let fetcher = Self::new();
        fetcher.set_events(events);
        fetcher
    }

    /// Sets the list returned by subsequent fetches.
    pub fn set_events(&self, events: Vec<CalendarEvent>) {
        *self.events.lock() = events;
    }

    /// Makes subsequent fetches fail with `error`.
    pub fn set_failure(&self, error: SyncError) {
        *self.failure.lock() = Some(error);
    }

    /// Makes subsequent fetches succeed again.
    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Makes every fetch take `delay` before completing.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Returns how many fetches have started.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFetcher for MockFetcher {
    async fn fetch_events(&self) -> SyncResult<Vec<CalendarEvent>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        Ok(self.events.lock().clone())
    }
}
