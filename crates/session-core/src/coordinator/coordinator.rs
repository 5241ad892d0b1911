//! Core SessionCoordinator structure and public API

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use uuid::Uuid;

use super::builder::SessionCoordinatorBuilder;
use super::event_handler::RadioWorker;
use crate::adapters::Collaborators;
use crate::config::CoordinatorConfig;
use crate::errors::{Result, SessionError};
use crate::events::{EventPublisher, StatusChange, StatusListener};
use crate::executor::SessionExecutor;
use crate::queue::{ControlRequest, RadioQueue};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::types::{ApMode, ClientRecord, FailureReason, SessionConfig, SessionState};

/// Last published public state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub failure_reason: FailureReason,
    /// Interface held by the running session
    pub interface_name: Option<String>,
}

impl StatusSnapshot {
    pub(crate) fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            failure_reason: FailureReason::None,
            interface_name: None,
        }
    }
}

/// Coordinates the access-point session of one radio
///
/// Requests are queued and handled one at a time by the radio worker, so a
/// stop can never race an in-flight interface event. State reads never wait
/// on the worker.
pub struct SessionCoordinator {
    id: Uuid,
    queue: RadioQueue,
    status: Arc<ArcSwap<StatusSnapshot>>,
    publisher: EventPublisher,
    stats: Arc<SessionStats>,
    mode: ApMode,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionCoordinator {
    pub fn builder() -> SessionCoordinatorBuilder {
        SessionCoordinatorBuilder::new()
    }

    /// Spawn the radio worker on the current tokio runtime
    pub(crate) fn spawn(
        config: CoordinatorConfig,
        collaborators: Collaborators,
        listeners: Vec<Arc<dyn StatusListener>>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::collaborator("spawn radio worker", e.to_string()))?;

        let config = Arc::new(config);
        let (queue, rx) = RadioQueue::channel();
        let status = Arc::new(ArcSwap::from_pointee(StatusSnapshot::idle()));
        let publisher = EventPublisher::new(config.event_channel_capacity, listeners);
        let stats = Arc::new(SessionStats::new());

        let executor = SessionExecutor::new(collaborators, config.clone(), queue.clone(), stats.clone());
        let worker = RadioWorker::new(
            executor,
            config.mode,
            status.clone(),
            publisher.clone(),
            stats.clone(),
        );
        let id = Uuid::new_v4();
        let span = tracing::info_span!("radio", coordinator = %id);
        let handle = runtime.spawn(tracing::Instrument::instrument(worker.run(rx), span));
        info!(coordinator = %id, mode = ?config.mode, "session coordinator started");

        Ok(Self {
            id,
            queue,
            status,
            publisher,
            stats,
            mode: config.mode,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Ask for the access point to be brought up with `config`.
    ///
    /// The configuration is copied; later changes to the caller's value do
    /// not affect the session. Ignored while a session is Enabling or
    /// Started, and while Failed until [`request_disable`] has been issued.
    ///
    /// [`request_disable`]: SessionCoordinator::request_disable
    pub fn request_enable(&self, config: &SessionConfig) -> Result<()> {
        debug!(ssid = %config.ssid, "enable requested");
        self.queue.send_control(ControlRequest::Enable(config.clone()))
    }

    /// Ask for the access point to be torn down. Also clears a Failed state.
    pub fn request_disable(&self) -> Result<()> {
        debug!("disable requested");
        self.queue.send_control(ControlRequest::Disable)
    }

    pub fn current_state(&self) -> SessionState {
        self.status.load().state
    }

    pub fn current_state_name(&self) -> &'static str {
        self.current_state().name()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.load_full().as_ref().clone()
    }

    /// Identifies this coordinator in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> ApMode {
        self.mode
    }

    /// Receive every status change published from now on
    pub fn subscribe_events(&self) -> broadcast::Receiver<StatusChange> {
        self.publisher.subscribe()
    }

    /// [`subscribe_events`](SessionCoordinator::subscribe_events) as a `Stream`
    pub fn event_stream(&self) -> BroadcastStream<StatusChange> {
        BroadcastStream::new(self.publisher.subscribe())
    }

    /// Fully resolved clients that are still associated
    pub async fn connected_devices(&self) -> Result<Vec<ClientRecord>> {
        let (tx, rx) = oneshot::channel();
        self.queue.send_control(ControlRequest::ListClients(tx))?;
        rx.await.map_err(|_| SessionError::WorkerStopped)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Tear down any running session and stop the radio worker
    pub async fn shutdown(&self) -> Result<()> {
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            return Err(SessionError::WorkerStopped);
        };

        let (tx, rx) = oneshot::channel();
        if self.queue.send_control(ControlRequest::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = handle.await {
            tracing::warn!("radio worker ended abnormally: {}", e);
        }
        info!("session coordinator stopped");
        Ok(())
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("id", &self.id)
            .field("status", &**self.status.load())
            .field("mode", &self.mode)
            .field("publisher", &self.publisher)
            .finish()
    }
}
