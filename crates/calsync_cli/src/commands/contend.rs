//! Contend command implementation.

use calsync_core::{ConcurrencyManager, CoreError, LockOptions, ManagerConfig};
use calsync_store::InMemoryStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Parameters for a contention run.
#[derive(Debug, Clone)]
pub struct ContendOptions {
    /// Number of concurrent workers.
    pub workers: usize,
    /// Lock hold time per worker, in milliseconds.
    pub hold_ms: u64,
    /// Acquisition timeout, in milliseconds.
    pub timeout_ms: u64,
    /// User owning the event.
    pub user: String,
    /// Event being edited.
    pub event: String,
}

/// What one worker observed.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    /// Worker index.
    pub worker: usize,
    /// Milliseconds from launch until the critical section started.
    pub started_ms: Option<u64>,
    /// Milliseconds from launch until the critical section ended.
    pub finished_ms: Option<u64>,
    /// Error if the lock could not be obtained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Contention run summary.
#[derive(Debug, Serialize)]
pub struct ContendReport {
    /// Lock key contended on.
    pub key: String,
    /// Per-worker results, ordered by start time.
    pub workers: Vec<WorkerReport>,
    /// Whether any two critical sections overlapped.
    pub overlapped: bool,
    /// Workers that gave up with "lock unavailable".
    pub timed_out: usize,
}

/// Launches the workers and collects their observations.
pub async fn contend(options: ContendOptions) -> ContendReport {
    let lock = LockOptions::new(Duration::from_millis(options.timeout_ms))
        .with_retry_interval(Duration::from_millis(10));
    let config = ManagerConfig::default().with_event_lock(lock);
    let manager = Arc::new(ConcurrencyManager::new(
        Arc::new(InMemoryStore::new()),
        config,
    ));
    let launched = Instant::now();
    let hold = Duration::from_millis(options.hold_ms);

    let tasks: Vec<_> = (0..options.workers)
        .map(|worker| {
            let manager = Arc::clone(&manager);
            let user = options.user.clone();
            let event = options.event.clone();
            tokio::spawn(async move {
                let result = manager
                    .with_event_lock(&user, &event, || async {
                        let started = launched.elapsed();
                        tokio::time::sleep(hold).await;
                        Ok::<_, CoreError>((started, launched.elapsed()))
                    })
                    .await;
                match result {
                    Ok((started, finished)) => WorkerReport {
                        worker,
                        started_ms: Some(started.as_millis() as u64),
                        finished_ms: Some(finished.as_millis() as u64),
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!(worker, error = %e, "worker gave up");
                        WorkerReport {
                            worker,
                            started_ms: None,
                            finished_ms: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
        })
        .collect();

    let mut workers = Vec::with_capacity(tasks.len());
    for (worker, task) in tasks.into_iter().enumerate() {
        match task.await {
            Ok(report) => workers.push(report),
            Err(e) => workers.push(WorkerReport {
                worker,
                started_ms: None,
                finished_ms: None,
                error: Some(e.to_string()),
            }),
        }
    }
    workers.sort_by_key(|w| w.started_ms.unwrap_or(u64::MAX));

    let overlapped = workers
        .iter()
        .filter_map(|w| w.started_ms.zip(w.finished_ms))
        .collect::<Vec<_>>()
        .windows(2)
        .any(|pair| pair[1].0 < pair[0].1);
    let timed_out = workers.iter().filter(|w| w.error.is_some()).count();

    ContendReport {
        key: calsync_core::LockKey::event(&options.user, &options.event).to_string(),
        workers,
        overlapped,
        timed_out,
    }
}

/// Runs the contend command.
pub async fn run(options: ContendOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = contend(options).await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!("Lock key: {}", report.key);
            println!();
            for w in &report.workers {
                match (&w.started_ms, &w.finished_ms, &w.error) {
                    (Some(start), Some(end), _) => {
                        println!("  worker {:>3}: held {:>6} ms .. {:>6} ms", w.worker, start, end)
                    }
                    (_, _, Some(error)) => println!("  worker {:>3}: {}", w.worker, error),
                    _ => println!("  worker {:>3}: no result", w.worker),
                }
            }
            println!();
            println!("Overlapping sections: {}", if report.overlapped { "yes" } else { "none" });
            println!("Timed out workers:    {}", report.timed_out);
        }
    }

    if report.overlapped {
        return Err("critical sections overlapped".into());
    }
    Ok(())
}
