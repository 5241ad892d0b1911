//! Radio worker loop
//!
//! Drains the radio queue one message at a time. Control requests are
//! checked against the public state and forwarded to the executor; executor
//! reports drive the public state, which is stored and published before the
//! next message is looked at.

use std::ops::ControlFlow;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::coordinator::StatusSnapshot;
use crate::events::{EventPublisher, StatusChange};
use crate::executor::{ExecutorCommand, ExecutorInput, ExecutorReport, SessionExecutor};
use crate::queue::{ControlRequest, RadioMessage};
use crate::stats::SessionStats;
use crate::types::{ApMode, FailureReason, SessionConfig, SessionState};

pub(crate) struct RadioWorker {
    executor: SessionExecutor,
    state: SessionState,
    mode: ApMode,
    status: Arc<ArcSwap<StatusSnapshot>>,
    publisher: EventPublisher,
    stats: Arc<SessionStats>,
}

impl RadioWorker {
    pub(crate) fn new(
        executor: SessionExecutor,
        mode: ApMode,
        status: Arc<ArcSwap<StatusSnapshot>>,
        publisher: EventPublisher,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            executor,
            state: SessionState::Idle,
            mode,
            status,
            publisher,
            stats,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RadioMessage>) {
        info!("radio worker started");

        while let Some(message) = rx.recv().await {
            match message {
                RadioMessage::Control(request) => {
                    if self.handle_control(request).await.is_break() {
                        break;
                    }
                }
                RadioMessage::Executor(input) => self.dispatch(input).await,
            }
        }

        // Dropping the executor aborts outstanding name polls
        info!("radio worker stopped");
    }

    /// Breaks once the worker has been asked to shut down
    async fn handle_control(&mut self, request: ControlRequest) -> ControlFlow<()> {
        match request {
            ControlRequest::Enable(config) => self.handle_enable(config).await,
            ControlRequest::Disable => self.handle_disable().await,
            ControlRequest::ListClients(reply) => {
                let _ = reply.send(self.executor.tracker().connected_devices());
            }
            ControlRequest::Shutdown(ack) => {
                self.stop_active_session().await;
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_enable(&mut self, config: SessionConfig) {
        match self.state {
            SessionState::Idle => {
                self.stats.record_enable_request();
                self.transition(SessionState::Enabling, FailureReason::None, None)
                    .await;
                self.dispatch(ExecutorInput::Command(ExecutorCommand::Start(config)))
                    .await;
            }
            SessionState::Failed => {
                info!(ssid = %config.ssid, "enable ignored: session failed, disable first");
            }
            state => {
                debug!(%state, ssid = %config.ssid, "enable ignored");
            }
        }
    }

    async fn handle_disable(&mut self) {
        match self.state {
            SessionState::Idle => trace!("disable ignored: already idle"),
            SessionState::Failed => {
                self.transition(SessionState::Idle, FailureReason::None, None)
                    .await;
            }
            SessionState::Enabling | SessionState::Started | SessionState::Disabling => {
                self.dispatch(ExecutorInput::Command(ExecutorCommand::Stop))
                    .await;
            }
        }
    }

    async fn stop_active_session(&mut self) {
        if self.executor.is_started() {
            info!("stopping active session before shutdown");
            self.dispatch(ExecutorInput::Command(ExecutorCommand::Stop))
                .await;
        }
    }

    async fn dispatch(&mut self, input: ExecutorInput) {
        let reports = self.executor.handle(input).await;
        for report in reports {
            self.apply(report).await;
        }
    }

    async fn apply(&mut self, report: ExecutorReport) {
        trace!(?report, state = %self.state, "executor report");
        match report {
            ExecutorReport::Enabled { interface } => {
                if self.state == SessionState::Enabling {
                    self.transition(SessionState::Started, FailureReason::None, Some(interface))
                        .await;
                } else {
                    debug!(state = %self.state, %interface, "enabled report ignored");
                }
            }
            ExecutorReport::Disabling { interface } => {
                self.transition(SessionState::Disabling, FailureReason::None, Some(interface))
                    .await;
            }
            ExecutorReport::Disabled { interface } => {
                self.transition(SessionState::Idle, FailureReason::None, Some(interface))
                    .await;
            }
            ExecutorReport::Failed { reason, interface } => {
                self.stats.record_failure(reason);
                self.transition(SessionState::Failed, reason, interface)
                    .await;
            }
        }
    }

    /// Store the new public state, then publish it
    async fn transition(
        &mut self,
        new_state: SessionState,
        failure_reason: FailureReason,
        interface_name: Option<String>,
    ) {
        let previous_state = self.state;
        if previous_state == new_state {
            return;
        }
        self.state = new_state;

        let held_interface = match new_state {
            SessionState::Started | SessionState::Disabling => interface_name.clone(),
            _ => None,
        };
        self.status.store(Arc::new(StatusSnapshot {
            state: new_state,
            failure_reason,
            interface_name: held_interface,
        }));

        if new_state == SessionState::Failed {
            warn!(from = %previous_state, reason = ?failure_reason, interface = ?interface_name, "session failed");
        } else {
            info!(from = %previous_state, to = %new_state, interface = ?interface_name, "session state changed");
        }

        self.publisher
            .publish(StatusChange {
                new_state,
                previous_state,
                failure_reason,
                interface_name,
                mode: self.mode,
                timestamp: Utc::now(),
            })
            .await;
    }
}
