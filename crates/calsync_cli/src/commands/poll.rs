//! Poll command implementation.

use async_trait::async_trait;
use calsync_protocol::CalendarEvent;
use calsync_sync_engine::{
    EventFetcher, SyncConfig, SyncEngine, SyncError, SyncOutcome, SyncResult, SyncSnapshot,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Fetches events by re-reading a JSON file.
///
/// Reads are blocking; event files are small.
#[derive(Debug, Clone)]
pub struct JsonFileFetcher {
    path: PathBuf,
}

impl JsonFileFetcher {
    /// Creates a fetcher for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventFetcher for JsonFileFetcher {
    async fn fetch_events(&self) -> SyncResult<Vec<CalendarEvent>> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| SyncError::transport_retryable(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&text).map_err(|e| SyncError::Decode(e.to_string()))
    }
}

/// What one pass did.
#[derive(Debug, Serialize)]
pub struct PassReport {
    /// Pass number, starting at 1.
    pub pass: usize,
    /// Read model after the pass.
    pub snapshot: SyncSnapshot,
    /// Content hash of the fetched set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Whether subscribers were notified.
    pub published: bool,
    /// Events in the published view.
    pub event_count: usize,
    /// Failure, if the pass failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs `passes` sync passes, `interval` apart.
pub async fn poll(path: &Path, interval: Duration, passes: usize) -> Vec<PassReport> {
    let fetcher = Arc::new(JsonFileFetcher::new(path));
    let engine = SyncEngine::new(
        SyncConfig::new("cli").with_poll_interval(interval),
        fetcher,
    );

    let mut reports = Vec::with_capacity(passes);
    for pass in 1..=passes {
        if pass > 1 {
            tokio::time::sleep(interval).await;
        }
        let (hash, published, error) = match engine.sync().await {
            Ok(SyncOutcome::Completed(result)) => {
                (Some(result.hash.to_hex()), result.published, None)
            }
            Ok(SyncOutcome::Skipped(reason)) => (None, false, Some(format!("skipped: {reason:?}"))),
            Err(e) => (None, false, Some(e.to_string())),
        };
        reports.push(PassReport {
            pass,
            snapshot: engine.snapshot(),
            hash,
            published,
            event_count: engine.events().len(),
            error,
        });
    }
    reports
}

/// Runs the poll command.
pub async fn run(
    path: &Path,
    interval_ms: u64,
    passes: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let reports = poll(path, Duration::from_millis(interval_ms), passes).await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&reports)?),
        _ => {
            for report in &reports {
                let status = serde_json::to_value(report.snapshot.status)?;
                print!(
                    "pass {:>3}: {:<8} events={:<4}",
                    report.pass,
                    status.as_str().unwrap_or("?"),
                    report.event_count
                );
                if report.published {
                    print!(" published");
                }
                if let Some(hash) = &report.hash {
                    print!(" hash={}", &hash[..12]);
                }
                if let Some(error) = &report.error {
                    print!(" error=\"{}\"", error);
                }
                println!();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::events_file;
    use calsync_sync_engine::SyncStatus;
    use calsync_testkit::sample_day;

    #[tokio::test(start_paused = true)]
    async fn unchanged_file_publishes_once() {
        let file = events_file(&sample_day());
        let reports = poll(file.path(), Duration::from_secs(30), 3).await;

        assert_eq!(reports.len(), 3);
        assert!(reports[0].published);
        assert!(!reports[1].published);
        assert!(!reports[2].published);
        assert_eq!(reports[0].hash, reports[2].hash);
        assert_eq!(reports[2].snapshot.status, SyncStatus::Success);
        assert_eq!(reports[2].event_count, 3);
    }

    #[tokio::test]
    async fn missing_file_is_an_error_pass() {
        let reports = poll(Path::new("/nonexistent/events.json"), Duration::ZERO, 1).await;

        assert_eq!(reports[0].snapshot.status, SyncStatus::Error);
        assert!(reports[0].error.as_deref().unwrap().contains("transport error"));
        assert_eq!(reports[0].event_count, 0);
    }
}
