//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::EventFetcher;
use calsync_protocol::{resolve, CalendarEvent, Conflict, ContentHash, Resolution};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

/// The current status of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No pass has run yet, or the session just came back online.
    Idle,
    /// A pass is in flight.
    Syncing,
    /// The last pass completed.
    Success,
    /// The last pass failed; previously published state is intact.
    Error,
    /// Connectivity is lost; timer passes are suppressed.
    Offline,
}

impl SyncStatus {
    /// Returns true if a new pass may start from this status.
    pub fn can_start_sync(&self) -> bool {
        matches!(
            self,
            SyncStatus::Idle | SyncStatus::Success | SyncStatus::Error
        )
    }
}

/// External signals driving the state machine besides the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    /// The host regained connectivity.
    Online,
    /// The host lost connectivity.
    Offline,
    /// The page or app became visible.
    Visible,
    /// The page or app was hidden.
    Hidden,
}

/// Why a requested pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass was already in flight.
    AlreadySyncing,
    /// The session is offline.
    Offline,
}

/// The read model exposed to UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    /// Current status.
    pub status: SyncStatus,
    /// Completion time of the last successful pass.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Events with local edits not yet confirmed by a pass.
    pub pending_changes: u64,
    /// Whether the session believes it is online.
    pub is_online: bool,
}

/// Statistics about sync passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that fetched successfully.
    pub passes_completed: u64,
    /// Passes that published a new event set.
    pub changes_published: u64,
    /// Passes that failed.
    pub failures: u64,
    /// Triggers dropped because a pass was in flight.
    pub skipped_overlapping: u64,
    /// Triggers dropped because the session was offline.
    pub skipped_offline: u64,
    /// Local edits settled by the configured strategy.
    pub conflicts_resolved: u64,
    /// Local edits handed over for interactive resolution.
    pub conflicts_unresolved: u64,
    /// Duration of the last completed pass.
    pub last_duration: Option<Duration>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a completed sync pass.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Whether the server content hash differed from the stored one.
    pub changed: bool,
    /// Whether a new event set was published to subscribers.
    pub published: bool,
    /// Content hash of the fetched server set.
    pub hash: ContentHash,
    /// Number of events in the published view.
    pub event_count: usize,
    /// Ids of local edits settled during this pass.
    pub resolved: Vec<String>,
    /// Local edits that need an interactive decision.
    pub unresolved: Vec<Conflict>,
    /// Duration of the pass.
    pub duration: Duration,
}

/// Outcome of a sync request.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// A pass ran to completion.
    Completed(SyncCycleResult),
    /// No pass ran.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Returns the pass result if a pass ran.
    pub fn completed(&self) -> Option<&SyncCycleResult> {
        match self {
            SyncOutcome::Completed(result) => Some(result),
            SyncOutcome::Skipped(_) => None,
        }
    }

    /// Returns true if the request was dropped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

#[derive(Debug)]
struct Inner {
    status: SyncStatus,
    in_flight: bool,
    online: bool,
    visible: bool,
    last_sync_time: Option<DateTime<Utc>>,
    last_hash: Option<ContentHash>,
    local_edits: BTreeMap<String, CalendarEvent>,
    unresolved: BTreeMap<String, Conflict>,
}

/// A polling sync session for one user.
///
/// # Invariants
///
/// - At most one pass is in flight; `sync()` while in flight is a no-op
/// - The stored hash and published set change only on a successful pass
/// - `Offline` is entered as soon as connectivity loss is signalled
pub struct SyncEngine<F: EventFetcher + ?Sized> {
    config: SyncConfig,
    fetcher: Arc<F>,
    inner: RwLock<Inner>,
    stats: RwLock<SyncStats>,
    published: watch::Sender<Arc<Vec<CalendarEvent>>>,
    pub(crate) wake: Notify,
}

impl<F: EventFetcher + ?Sized> SyncEngine<F> {
    /// Creates a new engine. The session starts online, visible and idle.
    pub fn new(config: SyncConfig, fetcher: Arc<F>) -> Self {
        let (published, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            config,
            fetcher,
            inner: RwLock::new(Inner {
                status: SyncStatus::Idle,
                in_flight: false,
                online: true,
                visible: true,
                last_sync_time: None,
                last_hash: None,
                local_edits: BTreeMap::new(),
                unresolved: BTreeMap::new(),
            }),
            stats: RwLock::new(SyncStats::default()),
            published,
            wake: Notify::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the fetcher.
    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        self.inner.read().status
    }

    /// Returns the completion time of the last successful pass.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_sync_time
    }

    /// Returns the number of events with local edits not yet confirmed.
    ///
    /// Repeated edits of one event count once.
    pub fn pending_changes(&self) -> u64 {
        self.inner.read().local_edits.len() as u64
    }

    /// Returns whether the session is online.
    pub fn is_online(&self) -> bool {
        self.inner.read().online
    }

    /// Returns whether the session is visible.
    pub fn is_visible(&self) -> bool {
        self.inner.read().visible
    }

    /// Returns the hash of the last successfully fetched server set.
    pub fn last_hash(&self) -> Option<ContentHash> {
        self.inner.read().last_hash
    }

    /// Returns the read model.
    pub fn snapshot(&self) -> SyncSnapshot {
        let inner = self.inner.read();
        SyncSnapshot {
            status: inner.status,
            last_sync_time: inner.last_sync_time,
            pending_changes: inner.local_edits.len() as u64,
            is_online: inner.online,
        }
    }

    /// Returns pass statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the currently published event set.
    pub fn events(&self) -> Arc<Vec<CalendarEvent>> {
        self.published.borrow().clone()
    }

    /// Subscribes to published event sets.
    ///
    /// The receiver is notified only when a pass publishes a changed set.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<CalendarEvent>>> {
        self.published.subscribe()
    }

    /// Returns local edits waiting for an interactive decision.
    pub fn unresolved_conflicts(&self) -> Vec<Conflict> {
        self.inner.read().unresolved.values().cloned().collect()
    }

    /// Records a local mutation to reconcile on the next pass.
    ///
    /// A later edit of the same event replaces the earlier one.
    pub fn track_local_change(&self, event: CalendarEvent) {
        let mut inner = self.inner.write();
        inner.unresolved.remove(&event.id);
        inner.local_edits.insert(event.id.clone(), event);
    }

    /// Requests an immediate pass to confirm tracked local changes.
    ///
    /// Serviced by the driver started with [`SyncEngine::spawn`].
    pub fn commit_changes(&self) {
        tracing::debug!(
            user = %self.config.user_id,
            pending = self.pending_changes(),
            "committing local changes"
        );
        self.request_sync();
    }

    /// Asks the driver to run a pass now, bypassing the timer.
    ///
    /// Dropped while a pass is in flight, like an overlapping `sync()`.
    pub fn request_sync(&self) {
        if self.inner.read().in_flight {
            self.stats.write().skipped_overlapping += 1;
            tracing::trace!(user = %self.config.user_id, "pass already in flight");
            return;
        }
        self.wake.notify_one();
    }

    /// Settles an edit that was left for interactive resolution.
    ///
    /// `winner` becomes the published copy. Returns false if no conflict
    /// was pending for that id.
    pub fn resolve_conflict(&self, winner: CalendarEvent) -> bool {
        let mut inner = self.inner.write();
        if inner.unresolved.remove(&winner.id).is_none() {
            return false;
        }
        inner.local_edits.remove(&winner.id);
        drop(inner);

        let mut events = self.events().as_ref().clone();
        match events.iter_mut().find(|e| e.id == winner.id) {
            Some(slot) => *slot = winner,
            None => events.push(winner),
        }
        self.published.send_replace(Arc::new(events));
        self.stats.write().changes_published += 1;
        true
    }

    /// Applies a connectivity or visibility signal.
    pub fn signal(&self, signal: SyncSignal) {
        match signal {
            SyncSignal::Online => self.set_online(true),
            SyncSignal::Offline => self.set_online(false),
            SyncSignal::Visible => self.set_visible(true),
            SyncSignal::Hidden => self.set_visible(false),
        }
    }

    /// Updates connectivity.
    ///
    /// Going offline takes effect immediately, even with a pass in flight.
    /// Coming back online returns to idle and forces one immediate pass.
    pub fn set_online(&self, online: bool) {
        let mut inner = self.inner.write();
        if inner.online == online {
            return;
        }
        inner.online = online;
        if online {
            inner.status = SyncStatus::Idle;
            drop(inner);
            tracing::info!(user = %self.config.user_id, "connectivity restored");
            self.request_sync();
        } else {
            inner.status = SyncStatus::Offline;
            tracing::info!(user = %self.config.user_id, "connectivity lost");
        }
    }

    /// Updates visibility. Becoming visible after being hidden forces a pass.
    pub fn set_visible(&self, visible: bool) {
        let mut inner = self.inner.write();
        let was_visible = std::mem::replace(&mut inner.visible, visible);
        let force = visible && !was_visible && inner.online;
        drop(inner);
        if force {
            tracing::debug!(user = %self.config.user_id, "became visible");
            self.request_sync();
        }
    }

    /// Runs one sync pass.
    ///
    /// Returns [`SyncOutcome::Skipped`] when a pass is already in flight or
    /// the session is offline. A fetch failure moves the status to
    /// [`SyncStatus::Error`] and is returned; the published set and stored
    /// hash are left untouched. Dropping the returned future mid-pass
    /// ends the pass as failed, so later passes are not blocked.
    pub async fn sync(&self) -> SyncResult<SyncOutcome> {
        {
            let mut inner = self.inner.write();
            if inner.in_flight {
                drop(inner);
                self.stats.write().skipped_overlapping += 1;
                tracing::trace!(user = %self.config.user_id, "pass already in flight");
                return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
            }
            if !inner.online {
                drop(inner);
                self.stats.write().skipped_offline += 1;
                return Ok(SyncOutcome::Skipped(SkipReason::Offline));
            }
            inner.in_flight = true;
            inner.status = SyncStatus::Syncing;
        }
        let guard = PassGuard {
            inner: &self.inner,
            user_id: &self.config.user_id,
            settled: false,
        };

        let started = Instant::now();
        let fetched = match tokio::time::timeout(
            self.config.fetch_timeout,
            self.fetcher.fetch_events(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        };

        let outcome = match fetched {
            Ok(server_events) => Ok(SyncOutcome::Completed(
                self.complete_pass(server_events, started.elapsed()),
            )),
            Err(error) => {
                self.fail_pass(&error);
                Err(error)
            }
        };
        guard.settle();
        outcome
    }

    fn complete_pass(
        &self,
        server_events: Vec<CalendarEvent>,
        duration: Duration,
    ) -> SyncCycleResult {
        let hash = ContentHash::of(&server_events);
        let current = self.events();

        let mut inner = self.inner.write();
        let changed = inner.last_hash != Some(hash);
        let merged = reconcile(
            server_events,
            &inner.local_edits,
            &current,
            self.config.conflict_strategy,
        );

        for id in &merged.resolved {
            inner.local_edits.remove(id);
        }
        for conflict in &merged.unresolved {
            inner
                .unresolved
                .insert(conflict.event_id().to_owned(), conflict.clone());
        }
        inner.last_hash = Some(hash);
        inner.last_sync_time = Some(Utc::now());
        inner.in_flight = false;
        if inner.online {
            inner.status = SyncStatus::Success;
        }
        drop(inner);

        let published = changed || merged.applied_local;
        let event_count = merged.events.len();
        if published {
            self.published.send_replace(Arc::new(merged.events));
        }

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.conflicts_resolved += merged.resolved.len() as u64;
            stats.conflicts_unresolved += merged.unresolved.len() as u64;
            stats.last_duration = Some(duration);
            if published {
                stats.changes_published += 1;
            }
        }

        tracing::debug!(
            user = %self.config.user_id,
            %hash,
            changed,
            published,
            events = event_count,
            "sync pass completed"
        );

        SyncCycleResult {
            changed,
            published,
            hash,
            event_count,
            resolved: merged.resolved,
            unresolved: merged.unresolved,
            duration,
        }
    }

    fn fail_pass(&self, error: &SyncError) {
        {
            let mut inner = self.inner.write();
            inner.in_flight = false;
            if inner.online {
                inner.status = SyncStatus::Error;
            }
        }
        {
            let mut stats = self.stats.write();
            stats.failures += 1;
            stats.last_error = Some(error.to_string());
        }
        tracing::warn!(
            user = %self.config.user_id,
            error = %error,
            retryable = error.is_retryable(),
            "sync pass failed"
        );
    }
}

impl<F: EventFetcher + ?Sized> std::fmt::Debug for SyncEngine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Ends an in-flight pass that was dropped before settling.
struct PassGuard<'a> {
    inner: &'a RwLock<Inner>,
    user_id: &'a str,
    settled: bool,
}

impl PassGuard<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.inner.write();
        inner.in_flight = false;
        inner.status = if inner.online {
            SyncStatus::Error
        } else {
            SyncStatus::Offline
        };
        drop(inner);
        tracing::warn!(user = %self.user_id, "sync pass cancelled");
    }
}

struct Reconciled {
    events: Vec<CalendarEvent>,
    resolved: Vec<String>,
    unresolved: Vec<Conflict>,
    applied_local: bool,
}

/// Overlays pending local edits onto the fetched server set.
///
/// Edits whose server copy is identical are confirmed. Edits with no server
/// copy yet stay pending and are shown as-is. Everything else goes through
/// the conflict strategy; `AskUser` keeps the server copy on display.
fn reconcile(
    server_events: Vec<CalendarEvent>,
    local_edits: &BTreeMap<String, CalendarEvent>,
    current: &[CalendarEvent],
    strategy: calsync_protocol::ConflictStrategy,
) -> Reconciled {
    let mut events = server_events;
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    let mut applied_local = false;

    for (id, local) in local_edits {
        match events.iter().position(|e| &e.id == id) {
            None => {
                if !current.contains(local) {
                    applied_local = true;
                }
                events.push(local.clone());
            }
            Some(index) if events[index] == *local => resolved.push(id.clone()),
            Some(index) => match resolve(local, &events[index], strategy) {
                Resolution::Resolved(winner) => {
                    if winner != events[index] {
                        applied_local = true;
                    }
                    events[index] = winner;
                    resolved.push(id.clone());
                }
                Resolution::AskUser(conflict) => unresolved.push(conflict),
            },
        }
    }

    Reconciled {
        events,
        resolved,
        unresolved,
        applied_local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockFetcher;
    use calsync_protocol::ConflictStrategy;
    use calsync_testkit::{event, event_at, sample_day};

    fn engine_with(
        events: Vec<CalendarEvent>,
        strategy: ConflictStrategy,
    ) -> (SyncEngine<MockFetcher>, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::with_events(events));
        let config = SyncConfig::new("alice").with_conflict_strategy(strategy);
        (SyncEngine::new(config, fetcher.clone()), fetcher)
    }

    #[test]
    fn status_can_start_sync() {
        assert!(SyncStatus::Idle.can_start_sync());
        assert!(SyncStatus::Success.can_start_sync());
        assert!(SyncStatus::Error.can_start_sync());
        assert!(!SyncStatus::Syncing.can_start_sync());
        assert!(!SyncStatus::Offline.can_start_sync());
    }

    #[tokio::test]
    async fn first_pass_publishes_and_succeeds() {
        let (engine, _) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        let mut rx = engine.subscribe();

        let outcome = engine.sync().await.unwrap();
        let result = outcome.completed().unwrap();

        assert!(result.changed);
        assert!(result.published);
        assert_eq!(result.event_count, 3);
        assert_eq!(engine.status(), SyncStatus::Success);
        assert!(engine.last_sync_time().is_some());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 3);
    }

    #[tokio::test]
    async fn reordered_fetch_does_not_republish() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        engine.sync().await.unwrap();
        let mut rx = engine.subscribe();

        let mut reversed = sample_day();
        reversed.reverse();
        fetcher.set_events(reversed);

        let result = engine.sync().await.unwrap();
        let result = result.completed().unwrap();
        assert!(!result.changed);
        assert!(!result.published);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(engine.stats().changes_published, 1);
    }

    #[tokio::test]
    async fn changed_field_republishes() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        engine.sync().await.unwrap();

        let mut events = sample_day();
        events[1].title = "Design review (moved)".into();
        fetcher.set_events(events);

        let result = engine.sync().await.unwrap();
        assert!(result.completed().unwrap().published);
        assert_eq!(engine.events()[1].title, "Design review (moved)");
    }

    #[tokio::test]
    async fn failed_fetch_keeps_published_state() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        engine.sync().await.unwrap();
        let hash = engine.last_hash();
        let synced_at = engine.last_sync_time();

        fetcher.set_failure(SyncError::transport_retryable("connection reset"));
        let err = engine.sync().await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(engine.status(), SyncStatus::Error);
        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.last_hash(), hash);
        assert_eq!(engine.last_sync_time(), synced_at);
        assert_eq!(
            engine.stats().last_error.as_deref(),
            Some("transport error: connection reset")
        );

        fetcher.clear_failure();
        engine.sync().await.unwrap();
        assert_eq!(engine.status(), SyncStatus::Success);
    }

    #[tokio::test]
    async fn offline_skips_passes() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        engine.set_online(false);

        assert_eq!(engine.status(), SyncStatus::Offline);
        let outcome = engine.sync().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Skipped(SkipReason::Offline)));
        assert!(outcome.is_skipped());
        assert_eq!(fetcher.fetch_count(), 0);

        engine.set_online(true);
        assert_eq!(engine.status(), SyncStatus::Idle);
        assert!(engine.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_sync_is_dropped() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        fetcher.set_delay(Duration::from_millis(200));

        let (first, second) = tokio::join!(engine.sync(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.sync().await
        });

        assert!(first.unwrap().completed().is_some());
        assert!(matches!(
            second.unwrap(),
            SyncOutcome::Skipped(SkipReason::AlreadySyncing)
        ));
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(engine.stats().skipped_overlapping, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn going_offline_mid_pass_wins() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        fetcher.set_delay(Duration::from_millis(100));

        let (result, _) = tokio::join!(engine.sync(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.set_online(false);
            assert_eq!(engine.status(), SyncStatus::Offline);
        });

        assert!(result.unwrap().completed().is_some());
        assert_eq!(engine.status(), SyncStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.set_delay(Duration::from_secs(60));
        let config = SyncConfig::new("alice").with_fetch_timeout(Duration::from_secs(1));
        let engine = SyncEngine::new(config, fetcher);

        assert_eq!(engine.sync().await.unwrap_err(), SyncError::Timeout);
        assert_eq!(engine.status(), SyncStatus::Error);
    }

    #[tokio::test]
    async fn server_wins_discards_local_edit() {
        let (engine, _) = engine_with(
            vec![event("ev1", "Server title")],
            ConflictStrategy::ServerWins,
        );
        engine.track_local_change(event_at("ev1", "Local title", 0, 5));
        assert_eq!(engine.pending_changes(), 1);

        let result = engine.sync().await.unwrap();
        let result = result.completed().unwrap();

        assert_eq!(result.resolved, vec!["ev1".to_string()]);
        assert_eq!(engine.pending_changes(), 0);
        assert_eq!(engine.events()[0].title, "Server title");
    }

    #[tokio::test]
    async fn client_wins_publishes_local_edit() {
        let (engine, _) = engine_with(
            vec![event("ev1", "Server title")],
            ConflictStrategy::ClientWins,
        );
        engine.sync().await.unwrap();

        engine.track_local_change(event_at("ev1", "Local title", 0, 5));
        let result = engine.sync().await.unwrap();
        let result = result.completed().unwrap();

        assert!(!result.changed);
        assert!(result.published);
        assert_eq!(engine.events()[0].title, "Local title");
        assert_eq!(engine.pending_changes(), 0);
    }

    #[tokio::test]
    async fn confirmed_edit_clears_pending() {
        let local = event_at("ev1", "Renamed", 0, 5);
        let (engine, _) = engine_with(vec![local.clone()], ConflictStrategy::AskUser);
        engine.track_local_change(local);

        let result = engine.sync().await.unwrap();
        assert_eq!(result.completed().unwrap().resolved, vec!["ev1".to_string()]);
        assert!(engine.unresolved_conflicts().is_empty());
        assert_eq!(engine.pending_changes(), 0);
    }

    #[tokio::test]
    async fn ask_user_leaves_edit_pending() {
        let (engine, _) =
            engine_with(vec![event("ev1", "Server title")], ConflictStrategy::AskUser);
        let local = event_at("ev1", "Local title", 0, 5);
        engine.track_local_change(local.clone());

        let result = engine.sync().await.unwrap();
        let result = result.completed().unwrap();

        assert_eq!(result.unresolved.len(), 1);
        assert_eq!(result.unresolved[0].local, local);
        assert_eq!(engine.pending_changes(), 1);
        assert_eq!(engine.events()[0].title, "Server title");
        assert_eq!(engine.unresolved_conflicts().len(), 1);

        assert!(engine.resolve_conflict(local));
        assert_eq!(engine.pending_changes(), 0);
        assert!(engine.unresolved_conflicts().is_empty());
        assert_eq!(engine.events()[0].title, "Local title");
        assert!(!engine.resolve_conflict(event("ev1", "again")));
    }

    #[tokio::test]
    async fn local_only_event_stays_pending() {
        let (engine, _) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        engine.sync().await.unwrap();

        engine.track_local_change(event_at("new", "Lunch", 180, 10));
        let first = engine.sync().await.unwrap();
        assert!(first.completed().unwrap().published);
        assert_eq!(engine.events().len(), 4);
        assert_eq!(engine.pending_changes(), 1);

        let second = engine.sync().await.unwrap();
        assert!(!second.completed().unwrap().published);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_pass_does_not_wedge_engine() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        fetcher.set_delay(Duration::from_millis(500));

        let cancelled = tokio::time::timeout(Duration::from_millis(100), engine.sync()).await;
        assert!(cancelled.is_err());
        assert_eq!(engine.status(), SyncStatus::Error);
        assert!(engine.events().is_empty());
        assert!(engine.last_hash().is_none());

        fetcher.set_delay(Duration::ZERO);
        let outcome = engine.sync().await.unwrap();
        assert!(outcome.completed().is_some());
        assert_eq!(engine.status(), SyncStatus::Success);
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_pass_while_offline_stays_offline() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        fetcher.set_delay(Duration::from_millis(500));

        {
            let sync = engine.sync();
            tokio::pin!(sync);
            let early = tokio::time::timeout(Duration::from_millis(50), sync.as_mut()).await;
            assert!(early.is_err());
            engine.set_online(false);
        }

        assert_eq!(engine.status(), SyncStatus::Offline);
        engine.set_online(true);
        assert!(engine.sync().await.unwrap().completed().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_pass_is_dropped() {
        let (engine, fetcher) = engine_with(sample_day(), ConflictStrategy::ServerWins);
        fetcher.set_delay(Duration::from_millis(200));

        let (result, _) = tokio::join!(engine.sync(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.request_sync();
        });
        result.unwrap();
        assert_eq!(engine.stats().skipped_overlapping, 1);

        let woken = tokio::time::timeout(Duration::from_millis(1), engine.wake.notified()).await;
        assert!(woken.is_err());
    }

    #[test]
    fn repeated_edits_of_one_event_count_once() {
        let (engine, _) = engine_with(vec![], ConflictStrategy::ServerWins);
        engine.track_local_change(event("a", "First"));
        engine.track_local_change(event("a", "Second"));
        assert_eq!(engine.pending_changes(), 1);
        assert_eq!(engine.snapshot().pending_changes, 1);

        engine.track_local_change(event("b", "Other"));
        assert_eq!(engine.pending_changes(), 2);
    }

    #[test]
    fn snapshot_reflects_state() {
        let (engine, _) = engine_with(vec![], ConflictStrategy::ServerWins);
        engine.track_local_change(event("a", "A"));
        engine.signal(SyncSignal::Offline);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.status, SyncStatus::Offline);
        assert_eq!(snapshot.pending_changes, 1);
        assert!(!snapshot.is_online);
        assert!(snapshot.last_sync_time.is_none());
    }
}
