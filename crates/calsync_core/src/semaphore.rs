//! In-process FIFO counting semaphore.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug)]
struct State {
    available: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// A counting semaphore admitting at most `total` concurrent holders.
///
/// Callers that find no permit are suspended in a FIFO queue. A released
/// permit is handed directly to the oldest waiter and never becomes
/// available in between, so late arrivals cannot overtake the queue.
///
/// Waits never time out. Operations run under a permit are expected to be
/// bounded.
///
/// # Invariants
///
/// - `0 <= available <= total`
/// - `available + permits held == total`
/// - A permit handed to a waiter that has since been dropped is passed on
///   to the next waiter rather than lost
#[derive(Debug)]
pub struct Semaphore {
    label: String,
    total: usize,
    state: Mutex<State>,
}

impl Semaphore {
    /// Creates a semaphore with `permits` permits (at least one).
    pub fn new(label: impl Into<String>, permits: usize) -> Self {
        let total = permits.max(1);
        Self {
            label: label.into(),
            total,
            state: Mutex::new(State {
                available: total,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Returns the semaphore's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the configured number of permits.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of permits not currently held.
    pub fn available(&self) -> usize {
        self.state.lock().available
    }

    /// Returns the number of suspended callers.
    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .waiters
            .iter()
            .filter(|w| !w.is_closed())
            .count()
    }

    /// Takes a permit if one is immediately available.
    pub fn try_acquire(&self) -> Option<SemaphorePermit<'_>> {
        let mut state = self.state.lock();
        if state.available > 0 {
            state.available -= 1;
            Some(SemaphorePermit { semaphore: self })
        } else {
            None
        }
    }

    /// Takes a permit, suspending in FIFO order until one is handed over.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        let rx = {
            let mut state = self.state.lock();
            if state.available > 0 {
                state.available -= 1;
                return SemaphorePermit { semaphore: self };
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(label = %self.label, queued = state.waiters.len(), "waiting for permit");
            rx
        };

        let mut waiter = Waiter {
            semaphore: self,
            rx: Some(rx),
        };
        waiter.granted().await;
        SemaphorePermit { semaphore: self }
    }

    /// Runs `operation` while holding a permit.
    ///
    /// The permit is released on every exit path, including panics.
    pub async fn with_permit<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        operation().await
    }

    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                debug!(label = %self.label, "permit handed to waiter");
                return;
            }
        }
        state.available = (state.available + 1).min(self.total);
    }
}

/// A held permit. Dropping it releases the permit.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Returns the label of the semaphore this permit belongs to.
    pub fn label(&self) -> &str {
        self.semaphore.label()
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

struct Waiter<'a> {
    semaphore: &'a Semaphore,
    rx: Option<oneshot::Receiver<()>>,
}

impl Waiter<'_> {
    async fn granted(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            // Queued senders are only consumed by a send in `release`.
            let _ = rx.await;
        }
        self.rx = None;
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        // Cancelled while queued: a permit may already be in flight to us.
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.semaphore.release();
            }
        }
    }
}
