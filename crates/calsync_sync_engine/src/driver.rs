//! Background polling driver.

use crate::state::{SyncEngine, SyncOutcome};
use crate::transport::EventFetcher;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a running sync driver.
///
/// Dropping the handle stops the driver after its current pass.
#[derive(Debug)]
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stops the driver and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Returns true if the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Startup,
    Timer,
    Forced,
}

impl<F: EventFetcher + ?Sized + 'static> SyncEngine<F> {
    /// Starts the polling driver on the current tokio runtime.
    ///
    /// The driver runs one pass immediately, then one per poll interval.
    /// Forced triggers (reconnect, becoming visible, committed changes)
    /// run a pass right away and restart the interval, so a reconnect
    /// after a long outage yields a single pass rather than one per missed
    /// tick.
    pub fn spawn(self: &Arc<Self>) -> SyncHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let engine = Arc::clone(self);
        let task = tokio::spawn(run(engine, shutdown_rx));
        SyncHandle { shutdown, task }
    }
}

async fn run<F: EventFetcher + ?Sized>(
    engine: Arc<SyncEngine<F>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = engine.config().poll_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        user = %engine.config().user_id,
        interval_ms = period.as_millis() as u64,
        "sync driver started"
    );

    // The startup pass covers any request made before the driver started.
    tokio::select! {
        biased;
        _ = engine.wake.notified() => {}
        _ = std::future::ready(()) => {}
    }
    run_pass(&engine, Trigger::Startup).await;

    loop {
        let trigger = tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => Trigger::Timer,
            _ = engine.wake.notified() => Trigger::Forced,
        };
        if matches!(trigger, Trigger::Forced) {
            ticker.reset();
        }
        run_pass(&engine, trigger).await;
    }

    tracing::info!(user = %engine.config().user_id, "sync driver stopped");
}

async fn run_pass<F: EventFetcher + ?Sized>(engine: &SyncEngine<F>, trigger: Trigger) {
    match engine.sync().await {
        Ok(SyncOutcome::Completed(result)) => {
            tracing::trace!(?trigger, published = result.published, "pass done");
        }
        Ok(SyncOutcome::Skipped(reason)) => {
            tracing::trace!(?trigger, ?reason, "pass skipped");
        }
        // Already logged by the engine; the next trigger retries.
        Err(_) => {}
    }
}
