//! Deadline arithmetic on the tokio clock.

use std::time::Duration;
use tokio::time::Instant;

/// Roughly 30 years; stands in for "never" when a deadline overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns `start + duration`, saturating to a far-future instant instead of
/// panicking on overflow (e.g. `Duration::MAX`).
pub fn instant_after(start: Instant, duration: Duration) -> Instant {
    start
        .checked_add(duration)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}
