//! services/api/src/sync.rs
//!
//! The cloud sync adapter: pulls the remote profile when a session starts and
//! pushes snapshots of the progression store while it lasts.
//!
//! All pushes for a session run on one worker task, one at a time. Change
//! requests coalesce into a single pending push that fires after the debounce
//! quiet period; a periodic tick pushes regardless of changes; and no push starts
//! until the cooldown since the previous one has elapsed. A request that arrives
//! while a push is in flight stays pending and is pushed afterwards.

use crate::config::SyncTiming;
use crate::web::protocol::ServerMessage;
use ascendant_core::ports::{PortError, RemoteProfileStore};
use ascendant_core::{ProgressionStore, Reconciliation, RemoteProfile};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// The progression store shared between handlers and the sync worker.
pub type SharedStore = Arc<Mutex<ProgressionStore>>;

//=========================================================================================
// Status and Trigger
//=========================================================================================

/// Outcome of recent sync activity, exposed to clients.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SyncStatus {
    pub user_id: Option<Uuid>,
    pub enabled: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub pushes: u64,
    pub failures: u64,
}

/// Handle used to ask the worker for a push. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    /// Requests a debounced push. Requests made before the worker gets to them
    /// collapse into one.
    pub fn request(&self) {
        self.notify.notify_one();
    }
}

//=========================================================================================
// Worker
//=========================================================================================

/// Everything the worker needs to push one user's snapshot.
#[derive(Clone)]
pub struct SyncWorker {
    pub user_id: Uuid,
    pub store: SharedStore,
    pub remote: Arc<dyn RemoteProfileStore>,
    pub timing: SyncTiming,
    pub status: Arc<Mutex<SyncStatus>>,
    pub events: broadcast::Sender<ServerMessage>,
}

impl SyncWorker {
    /// Starts the worker task. It runs until `token` is cancelled, flushing any
    /// pending request before it exits.
    pub fn spawn(self, token: CancellationToken) -> (SyncTrigger, JoinHandle<()>) {
        let trigger = SyncTrigger::default();
        let notify = trigger.notify.clone();
        let handle = tokio::spawn(async move { self.run(notify, token).await });
        (trigger, handle)
    }

    async fn run(self, notify: Arc<Notify>, token: CancellationToken) {
        info!("Sync worker started for user {}", self.user_id);
        let timing = self.timing;
        let mut ticker = interval_at(Instant::now() + timing.interval, timing.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending = false;
        let mut due = Instant::now();
        let mut last_push_end: Option<Instant> = None;

        loop {
            let ready_at = match last_push_end {
                Some(end) => due.max(end + timing.cooldown),
                None => due,
            };

            tokio::select! {
                _ = token.cancelled() => {
                    if pending {
                        debug!("Flushing pending sync before shutdown");
                        self.push().await;
                    }
                    break;
                }
                _ = notify.notified() => {
                    pending = true;
                    due = Instant::now() + timing.debounce;
                }
                _ = ticker.tick() => {
                    pending = true;
                    due = Instant::now();
                }
                _ = sleep_until(ready_at), if pending => {
                    pending = false;
                    self.push().await;
                    last_push_end = Some(Instant::now());
                }
            }
        }
        info!("Sync worker stopped for user {}", self.user_id);
    }

    /// Serializes the whole store and overwrites the remote record.
    /// Failures are recorded and broadcast, never retried.
    pub async fn push(&self) -> bool {
        let profile = {
            let store = self.store.lock().await;
            let snapshot = store.snapshot();
            RemoteProfile {
                user_id: self.user_id,
                onboarding_complete: snapshot.stats.onboarding_complete,
                snapshot,
                updated_at: Utc::now(),
            }
        };

        match self.remote.upsert_profile(&profile).await {
            Ok(()) => {
                debug!("Pushed profile for {}", self.user_id);
                let mut status = self.status.lock().await;
                status.pushes += 1;
                status.last_success = Some(profile.updated_at);
                status.last_error = None;
                let _ = self.events.send(ServerMessage::SyncCompleted {
                    at: profile.updated_at,
                });
                true
            }
            Err(e) => {
                error!("Cloud sync push failed: {}", e);
                let message = format!("Cloud sync failed: {}", e);
                let mut status = self.status.lock().await;
                status.failures += 1;
                status.last_error = Some(message.clone());
                let _ = self.events.send(ServerMessage::SyncFailed { message });
                false
            }
        }
    }
}

//=========================================================================================
// Session Lifecycle
//=========================================================================================

/// A running sync session for one user.
pub struct SyncSession {
    pub user_id: Uuid,
    pub trigger: Option<SyncTrigger>,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SyncSession {
    /// A session with no worker (local-only mode or failed pull).
    pub fn local(user_id: Uuid) -> Self {
        Self {
            user_id,
            trigger: None,
            token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Stops the worker, waiting for its final flush.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Some(handle) = self.handle {
            if let Err(e) = handle.await {
                warn!("Sync worker ended abnormally: {}", e);
            }
        }
    }
}

/// Pulls the remote profile, reconciles local state with it and starts the
/// push worker.
///
/// A failed pull leaves local state untouched and starts no worker, so a stale
/// local copy never overwrites the remote record.
pub async fn begin_session(
    worker: SyncWorker,
) -> (SyncSession, Result<Reconciliation, PortError>) {
    let user_id = worker.user_id;
    {
        let mut status = worker.status.lock().await;
        *status = SyncStatus {
            user_id: Some(user_id),
            enabled: true,
            ..Default::default()
        };
    }

    let remote = match worker.remote.fetch_profile(user_id).await {
        Ok(remote) => remote,
        Err(e) => {
            error!("Cloud sync pull failed for {}: {}", user_id, e);
            let message = format!("Could not load your cloud profile: {}", e);
            {
                let mut status = worker.status.lock().await;
                status.enabled = false;
                status.failures += 1;
                status.last_error = Some(message.clone());
            }
            let _ = worker.events.send(ServerMessage::SyncFailed { message });
            return (SyncSession::local(user_id), Err(e));
        }
    };

    let outcome = worker.store.lock().await.reconcile_remote(remote);
    info!("Session started for {}: {:?}", user_id, outcome);

    let token = CancellationToken::new();
    let (trigger, handle) = worker.spawn(token.clone());
    let session = SyncSession {
        user_id,
        trigger: Some(trigger),
        token,
        handle: Some(handle),
    };
    (session, Ok(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascendant_core::ports::PortResult;
    use ascendant_core::{MemoryStorage, QuestDraft, SystemClock};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRemote {
        profiles: StdMutex<HashMap<Uuid, RemoteProfile>>,
        pushes: StdMutex<Vec<tokio::time::Instant>>,
        finished: StdMutex<Vec<tokio::time::Instant>>,
        latency: Duration,
        fail: bool,
    }

    impl RecordingRemote {
        fn push_count(&self) -> usize {
            self.pushes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteProfileStore for RecordingRemote {
        async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Option<RemoteProfile>> {
            if self.fail {
                return Err(PortError::Unexpected("offline".to_string()));
            }
            Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
        }

        async fn upsert_profile(&self, profile: &RemoteProfile) -> PortResult<()> {
            self.pushes.lock().unwrap().push(tokio::time::Instant::now());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.finished.lock().unwrap().push(tokio::time::Instant::now());
            if self.fail {
                return Err(PortError::Unexpected("offline".to_string()));
            }
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.user_id, profile.clone());
            Ok(())
        }
    }

    fn worker(remote: Arc<RecordingRemote>) -> SyncWorker {
        let store = ProgressionStore::load(Arc::new(MemoryStorage::new()), Arc::new(SystemClock));
        let (events, _) = broadcast::channel(16);
        SyncWorker {
            user_id: Uuid::new_v4(),
            store: Arc::new(Mutex::new(store)),
            remote,
            timing: SyncTiming::default(),
            status: Arc::new(Mutex::new(SyncStatus::default())),
            events,
        }
    }

    /// Lets the worker task observe time that was just advanced.
    async fn settle(by: Duration) {
        tokio::time::sleep(by).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_of_changes_collapse_into_one_push() {
        let remote = Arc::new(RecordingRemote::default());
        let token = CancellationToken::new();
        let (trigger, handle) = worker(remote.clone()).spawn(token.clone());

        for _ in 0..5 {
            trigger.request();
            settle(Duration::from_millis(300)).await;
        }
        assert_eq!(remote.push_count(), 0);

        settle(Duration::from_millis(2100)).await;
        assert_eq!(remote.push_count(), 1);

        token.cancel();
        handle.await.unwrap();
        assert_eq!(remote.push_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_tick_pushes_without_changes() {
        let remote = Arc::new(RecordingRemote::default());
        let token = CancellationToken::new();
        let (_trigger, handle) = worker(remote.clone()).spawn(token.clone());

        settle(Duration::from_secs(29)).await;
        assert_eq!(remote.push_count(), 0);
        settle(Duration::from_secs(2)).await;
        assert_eq!(remote.push_count(), 1);
        settle(Duration::from_secs(30)).await;
        assert_eq!(remote.push_count(), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_defers_but_never_drops() {
        let remote = Arc::new(RecordingRemote::default());
        let mut w = worker(remote.clone());
        w.timing = SyncTiming {
            debounce: Duration::from_millis(100),
            interval: Duration::from_secs(3600),
            cooldown: Duration::from_secs(5),
        };
        let token = CancellationToken::new();
        let (trigger, handle) = w.spawn(token.clone());

        trigger.request();
        settle(Duration::from_millis(200)).await;
        assert_eq!(remote.push_count(), 1);

        trigger.request();
        settle(Duration::from_secs(1)).await;
        assert_eq!(remote.push_count(), 1);

        settle(Duration::from_secs(5)).await;
        assert_eq!(remote.push_count(), 2);

        let pushes = remote.pushes.lock().unwrap().clone();
        assert!(pushes[1] - pushes[0] >= Duration::from_secs(5));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_push_runs_once_after_it() {
        let remote = Arc::new(RecordingRemote {
            latency: Duration::from_secs(1),
            ..Default::default()
        });
        let mut w = worker(remote.clone());
        w.timing = SyncTiming {
            debounce: Duration::from_millis(100),
            interval: Duration::from_secs(3600),
            cooldown: Duration::from_secs(2),
        };
        let token = CancellationToken::new();
        let (trigger, handle) = w.spawn(token.clone());

        trigger.request();
        settle(Duration::from_millis(500)).await;
        assert_eq!(remote.push_count(), 1);
        assert!(remote.finished.lock().unwrap().is_empty());

        // Arrives while the first upsert is still in flight.
        trigger.request();
        trigger.request();
        settle(Duration::from_secs(1)).await;
        assert_eq!(remote.push_count(), 1);
        assert_eq!(remote.finished.lock().unwrap().len(), 1);

        settle(Duration::from_secs(3)).await;
        assert_eq!(remote.push_count(), 2);
        assert_eq!(remote.finished.lock().unwrap().len(), 2);

        let starts = remote.pushes.lock().unwrap().clone();
        let ends = remote.finished.lock().unwrap().clone();
        assert!(starts[1] >= ends[0] + Duration::from_secs(2));

        settle(Duration::from_secs(10)).await;
        assert_eq!(remote.push_count(), 2);

        token.cancel();
        handle.await.unwrap();
        assert_eq!(remote.push_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_request() {
        let remote = Arc::new(RecordingRemote::default());
        let token = CancellationToken::new();
        let (trigger, handle) = worker(remote.clone()).spawn(token.clone());

        trigger.request();
        settle(Duration::from_millis(10)).await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(remote.push_count(), 1);
    }

    #[tokio::test]
    async fn push_failure_is_recorded_and_broadcast() {
        let remote = Arc::new(RecordingRemote {
            fail: true,
            ..Default::default()
        });
        let w = worker(remote);
        let mut rx = w.events.subscribe();

        assert!(!w.push().await);

        let status = w.status.lock().await.clone();
        assert_eq!(status.failures, 1);
        assert!(status.last_error.unwrap().contains("offline"));
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::SyncFailed { .. }));
    }

    #[tokio::test]
    async fn session_restores_onboarded_remote_profile() {
        let remote = Arc::new(RecordingRemote::default());
        let w = worker(remote.clone());
        {
            let mut store = w.store.lock().await;
            store.complete_onboarding("Jin").unwrap();
            store
                .add_quest(QuestDraft {
                    title: "Synced quest".to_string(),
                    ..Default::default()
                })
                .unwrap();
        }
        assert!(w.push().await);

        // A second device with empty local state picks the profile up.
        let mut other = worker(remote.clone());
        other.user_id = w.user_id;
        let (session, outcome) = begin_session(other.clone()).await;
        assert_eq!(outcome.unwrap(), Reconciliation::Restored);
        assert_eq!(other.store.lock().await.quests()[0].title, "Synced quest");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn failed_pull_keeps_local_state_and_disables_pushes() {
        let remote = Arc::new(RecordingRemote {
            fail: true,
            ..Default::default()
        });
        let w = worker(remote.clone());
        w.store
            .lock()
            .await
            .add_quest(QuestDraft {
                title: "Offline quest".to_string(),
                ..Default::default()
            })
            .unwrap();

        let (session, outcome) = begin_session(w.clone()).await;
        assert!(outcome.is_err());
        assert!(session.trigger.is_none());
        assert_eq!(w.store.lock().await.quests().len(), 1);
        assert!(!w.status.lock().await.enabled);
        session.shutdown().await;
        assert_eq!(remote.push_count(), 0);
    }
}
