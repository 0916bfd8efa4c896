//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the helpers handlers use to mutate
//! the progression store.

use crate::config::Config;
use crate::sync::{begin_session, SharedStore, SyncSession, SyncStatus, SyncWorker};
use crate::web::protocol::ServerMessage;
use ascendant_core::ports::{PortError, RemoteProfileStore};
use ascendant_core::{ProgressResult, ProgressionStore, Reconciliation};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub store: SharedStore,
    /// `None` runs the service local-only.
    pub remote: Option<Arc<dyn RemoteProfileStore>>,
    pub config: Arc<Config>,
    pub events: broadcast::Sender<ServerMessage>,
    pub sync_status: Arc<Mutex<SyncStatus>>,
    session: Mutex<Option<SyncSession>>,
}

impl AppState {
    pub fn new(
        store: ProgressionStore,
        remote: Option<Arc<dyn RemoteProfileStore>>,
        config: Arc<Config>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store: Arc::new(Mutex::new(store)),
            remote,
            config,
            events,
            sync_status: Arc::new(Mutex::new(SyncStatus::default())),
            session: Mutex::new(None),
        }
    }

    /// Runs one store mutation. On success the queued progression events are
    /// broadcast and a sync push is requested.
    ///
    /// The store lock is released before the session lock is taken.
    pub async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut ProgressionStore) -> ProgressResult<T>,
    ) -> ProgressResult<T> {
        let (result, events) = {
            let mut store = self.store.lock().await;
            let result = op(&mut store);
            (result, store.drain_events())
        };
        for event in events {
            let _ = self.events.send(ServerMessage::from(event));
        }
        if result.is_ok() {
            self.request_sync().await;
        }
        result
    }

    pub async fn request_sync(&self) {
        let session = self.session.lock().await;
        if let Some(trigger) = session.as_ref().and_then(|s| s.trigger.as_ref()) {
            trigger.request();
        }
    }

    pub async fn session_user(&self) -> Option<Uuid> {
        self.session.lock().await.as_ref().map(|s| s.user_id)
    }

    //=====================================================================================
    // Session Lifecycle
    //=====================================================================================

    /// Starts a session for `user_id`, ending any previous one first.
    ///
    /// Returns `Ok(None)` when running local-only.
    pub async fn start_session(&self, user_id: Uuid) -> Result<Option<Reconciliation>, PortError> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            debug!("Replacing session for {}", previous.user_id);
            previous.shutdown().await;
        }

        let Some(remote) = self.remote.clone() else {
            info!("Cloud sync disabled; local-only session for {}", user_id);
            *self.sync_status.lock().await = SyncStatus {
                user_id: Some(user_id),
                ..Default::default()
            };
            *session = Some(SyncSession::local(user_id));
            return Ok(None);
        };

        let worker = SyncWorker {
            user_id,
            store: self.store.clone(),
            remote,
            timing: self.config.sync,
            status: self.sync_status.clone(),
            events: self.events.clone(),
        };
        let (started, outcome) = begin_session(worker).await;
        *session = Some(started);
        outcome.map(Some)
    }

    /// Stops the sync worker, flushing any pending push, but keeps local state.
    pub async fn stop_sync(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.shutdown().await;
        }
    }

    /// Ends the session: flushes any pending push, then clears local state.
    pub async fn end_session(&self) -> bool {
        let Some(session) = self.session.lock().await.take() else {
            return false;
        };
        let user_id = session.user_id;
        session.shutdown().await;
        self.store.lock().await.reset();
        *self.sync_status.lock().await = SyncStatus::default();
        info!("Session ended for {}", user_id);
        true
    }
}
