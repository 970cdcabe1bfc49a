//! Overlap measurement for critical sections.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct TrackerState {
    current: usize,
    max: usize,
    intervals: Vec<(Instant, Instant)>,
}

/// Records how many observed operations run at the same time.
///
/// Clones share state, so one tracker can be handed to many tasks.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl ConcurrencyTracker {
    /// Creates a tracker with no observations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `operation` so its start and end are recorded.
    pub fn observe<F: Future>(&self, operation: F) -> impl Future<Output = F::Output> {
        let tracker = self.clone();
        async move {
            let started = tracker.enter();
            let output = operation.await;
            tracker.exit(started);
            output
        }
    }

    fn enter(&self) -> Instant {
        let mut state = self.state.lock();
        state.current += 1;
        state.max = state.max.max(state.current);
        Instant::now()
    }

    fn exit(&self, started: Instant) {
        let mut state = self.state.lock();
        state.current -= 1;
        state.intervals.push((started, Instant::now()));
    }

    /// Highest number of operations observed in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.state.lock().max
    }

    /// Number of observed operations that have finished.
    pub fn completed(&self) -> usize {
        self.state.lock().intervals.len()
    }

    /// Finished operations as `(start, end)` pairs, sorted by start.
    pub fn intervals(&self) -> Vec<(Instant, Instant)> {
        let mut intervals = self.state.lock().intervals.clone();
        intervals.sort_by_key(|(start, _)| *start);
        intervals
    }

    /// Returns true if no two finished operations overlapped in time.
    pub fn intervals_disjoint(&self) -> bool {
        self.intervals()
            .windows(2)
            .all(|pair| pair[1].0 >= pair[0].1)
    }
}
