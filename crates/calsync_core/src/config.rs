//! Configuration for locks and the concurrency manager.

use rand::Rng;
use std::time::Duration;

/// Options for a single lock acquisition.
///
/// `timeout` bounds the whole acquisition loop and is also the expiry of the
/// lock record, so a crashed holder blocks others for at most `timeout`.
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Maximum time to spend acquiring, and the lock record's expiry.
    pub timeout: Duration,
    /// Delay between attempts while the lock is held by someone else.
    pub retry_interval: Duration,
    /// Upper bound on the backoff applied after store errors.
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff after store errors.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff delays.
    pub add_jitter: bool,
}

impl LockOptions {
    /// Creates options with the given timeout and default retry behaviour.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            retry_interval: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Sets the retry interval.
    #[must_use]
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the maximum backoff after store errors.
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay after the given number of consecutive store
    /// failures (0 = no failure, plain retry interval).
    pub fn delay_for_failures(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.retry_interval;
        }

        let base = self.retry_interval.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(failures.saturating_sub(1).min(32) as i32);
        let delay_secs = base.min(self.max_backoff.as_secs_f64());

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::try_from_secs_f64(delay_secs + jitter).unwrap_or(Duration::MAX)
        } else {
            Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
        }
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Configuration for the named critical sections of the concurrency manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Options for per-event edit locks.
    pub event_lock: LockOptions,
    /// Options for per-user calendar sync locks.
    pub calendar_sync_lock: LockOptions,
    /// Options for per-pair friend request locks.
    pub friend_request_lock: LockOptions,
    /// Concurrent AI generation calls.
    pub ai_permits: usize,
    /// Concurrent external calendar API calls.
    pub api_permits: usize,
    /// Concurrent batch jobs.
    pub batch_permits: usize,
}

impl ManagerConfig {
    /// Creates a configuration with the default catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event lock options.
    #[must_use]
    pub fn with_event_lock(mut self, options: LockOptions) -> Self {
        self.event_lock = options;
        self
    }

    /// Sets the calendar sync lock options.
    #[must_use]
    pub fn with_calendar_sync_lock(mut self, options: LockOptions) -> Self {
        self.calendar_sync_lock = options;
        self
    }

    /// Sets the friend request lock options.
    #[must_use]
    pub fn with_friend_request_lock(mut self, options: LockOptions) -> Self {
        self.friend_request_lock = options;
        self
    }

    /// Sets the AI call permit count.
    #[must_use]
    pub fn with_ai_permits(mut self, permits: usize) -> Self {
        self.ai_permits = permits;
        self
    }

    /// Sets the external API permit count.
    #[must_use]
    pub fn with_api_permits(mut self, permits: usize) -> Self {
        self.api_permits = permits;
        self
    }

    /// Sets the batch job permit count.
    #[must_use]
    pub fn with_batch_permits(mut self, permits: usize) -> Self {
        self.batch_permits = permits;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            event_lock: LockOptions::new(Duration::from_secs(10)),
            calendar_sync_lock: LockOptions::new(Duration::from_secs(60))
                .with_retry_interval(Duration::from_millis(500)),
            friend_request_lock: LockOptions::new(Duration::from_secs(10)),
            ai_permits: 3,
            api_permits: 5,
            batch_permits: 2,
        }
    }
}
