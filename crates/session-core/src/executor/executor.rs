//! SessionExecutor state machine

use std::sync::Arc;

use softap_infra_common::LogContext;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn, Instrument};

use super::{ExecutorCommand, ExecutorInput, ExecutorReport, InterfaceHandle};
use crate::adapters::{Collaborators, LivenessToken, SubscriptionId};
use crate::config::{CoordinatorConfig, LinkDownPolicy};
use crate::errors::{Result, SessionError};
use crate::presence::ClientPresenceTracker;
use crate::queue::RadioQueue;
use crate::stats::SessionStats;
use crate::types::{ApDaemonConfig, Band, FailureReason, SessionConfig, AUTO_CHANNEL};

enum ExecutorState {
    Idle,
    Started(ActiveSession),
}

struct ActiveSession {
    handle: InterfaceHandle,
    dual_mode: bool,
    enabled_reported: bool,
    registrations: Registrations,
}

/// A subscription with a collaborator plus the task forwarding its events
/// into the radio queue
struct Registration {
    id: SubscriptionId,
    forwarder: JoinHandle<()>,
}

#[derive(Default)]
struct Registrations {
    liveness: Option<Registration>,
    link: Option<Registration>,
    associations: Option<Registration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeardownCause {
    Requested,
    DriverDied,
    LinkLost,
}

/// Drives the access-point daemon for one radio
pub struct SessionExecutor {
    collaborators: Collaborators,
    config: Arc<CoordinatorConfig>,
    queue: RadioQueue,
    tracker: ClientPresenceTracker,
    stats: Arc<SessionStats>,
    state: ExecutorState,
    last_session: u64,
}

impl SessionExecutor {
    pub fn new(
        collaborators: Collaborators,
        config: Arc<CoordinatorConfig>,
        queue: RadioQueue,
        stats: Arc<SessionStats>,
    ) -> Self {
        let tracker = ClientPresenceTracker::new(
            &config,
            collaborators.notifier.clone(),
            queue.clone(),
            stats.clone(),
        );
        Self {
            collaborators,
            config,
            queue,
            tracker,
            stats,
            state: ExecutorState::Idle,
            last_session: 0,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, ExecutorState::Started(_))
    }

    /// Started and the interface has been reported up
    pub fn is_enabled(&self) -> bool {
        matches!(&self.state, ExecutorState::Started(active) if active.enabled_reported)
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            ExecutorState::Idle => "Idle",
            ExecutorState::Started(_) => "Started",
        }
    }

    pub fn interface_name(&self) -> Option<&str> {
        match &self.state {
            ExecutorState::Started(active) => Some(active.handle.name()),
            ExecutorState::Idle => None,
        }
    }

    /// Generation of the running session, if any
    pub fn current_session(&self) -> Option<u64> {
        match &self.state {
            ExecutorState::Started(active) => Some(active.handle.session()),
            ExecutorState::Idle => None,
        }
    }

    pub fn tracker(&self) -> &ClientPresenceTracker {
        &self.tracker
    }

    /// Process one input. Inputs that are not valid in the current state
    /// are ignored.
    pub async fn handle(&mut self, input: ExecutorInput) -> Vec<ExecutorReport> {
        let mut reports = Vec::new();

        match input {
            ExecutorInput::Command(ExecutorCommand::Start(config)) => {
                self.handle_start(config, &mut reports).await;
            }
            ExecutorInput::Command(ExecutorCommand::Stop) => {
                if self.is_started() {
                    self.teardown(TeardownCause::Requested, &mut reports).await;
                } else {
                    trace!("stop ignored while idle");
                }
            }
            ExecutorInput::LinkChanged { session, event } => {
                self.handle_link_changed(session, event.interface, event.is_up, &mut reports)
                    .await;
            }
            ExecutorInput::DriverDied { session, death } => {
                if self.current_session() == Some(session) && death.token == LivenessToken(session) {
                    warn!(session, "{}, tearing session down", SessionError::LivenessLost);
                    self.teardown(TeardownCause::DriverDied, &mut reports).await;
                } else {
                    debug!(session, "ignoring death notice for inactive session");
                }
            }
            ExecutorInput::Association { session, event } => {
                if self.current_session() == Some(session) {
                    self.tracker.on_association(event).await;
                } else {
                    trace!(session, mac = %event.mac, "ignoring association for inactive session");
                }
            }
            ExecutorInput::NameResolved(resolution) => {
                if self.current_session() == Some(resolution.session) {
                    self.tracker.on_name_resolved(resolution);
                } else {
                    trace!(mac = %resolution.mac, "ignoring resolution for inactive session");
                }
            }
        }

        reports
    }

    async fn handle_start(&mut self, config: SessionConfig, reports: &mut Vec<ExecutorReport>) {
        if let ExecutorState::Started(active) = &self.state {
            debug!(interface = %active.handle.name(), "start ignored, session already running");
            return;
        }

        self.last_session += 1;
        let session = self.last_session;
        let span = LogContext::with_operation("executor", "start")
            .with_field("ssid", config.ssid.clone())
            .with_field("session", session.to_string())
            .span();

        match self.bring_up(session, &config).instrument(span).await {
            Ok(active) => {
                info!(interface = %active.handle.name(), session, "daemon started, waiting for interface");
                self.tracker.activate(session);
                self.state = ExecutorState::Started(active);
                self.enter_started(reports).await;
            }
            Err(e) => {
                let reason = e.failure_reason();
                warn!(session, ?reason, "start failed: {}", e);
                self.tracker.clear();
                reports.push(ExecutorReport::Failed {
                    reason,
                    interface: None,
                });
            }
        }
    }

    /// Entry action of Started: the link may have come up before the
    /// listener was attached
    async fn enter_started(&mut self, reports: &mut Vec<ExecutorReport>) {
        let ExecutorState::Started(active) = &mut self.state else {
            return;
        };

        match self.collaborators.link.query_link_state(active.handle.name()).await {
            Ok(true) => mark_enabled(active, &self.stats, reports),
            Ok(false) => debug!(interface = %active.handle.name(), "interface not up yet"),
            Err(e) => warn!(interface = %active.handle.name(), "link state query failed: {}", e),
        }
    }

    async fn handle_link_changed(
        &mut self,
        session: u64,
        interface: String,
        is_up: bool,
        reports: &mut Vec<ExecutorReport>,
    ) {
        let ExecutorState::Started(active) = &mut self.state else {
            trace!(interface = %interface, "link event while idle");
            return;
        };
        if active.handle.session() != session || active.handle.name() != interface {
            trace!(interface = %interface, session, "ignoring link event for another session");
            return;
        }

        if is_up {
            if active.enabled_reported {
                debug!(interface = %interface, "interface up again, already enabled");
            } else {
                mark_enabled(active, &self.stats, reports);
            }
            return;
        }

        if active.enabled_reported && self.config.link_down_policy == LinkDownPolicy::Teardown {
            warn!(interface = %interface, "interface went down, tearing session down");
            self.teardown(TeardownCause::LinkLost, reports).await;
        } else {
            info!(interface = %interface, "interface down");
        }
    }

    async fn bring_up(&self, session: u64, config: &SessionConfig) -> Result<ActiveSession> {
        config.validate()?;

        let interface = self
            .collaborators
            .driver
            .interface_name()
            .await
            .map_err(|e| SessionError::daemon_start(format!("no interface name: {}", e)))?;

        let mut registrations = Registrations::default();
        match self
            .register_and_start(session, config, &interface, &mut registrations)
            .await
        {
            Ok(()) => Ok(ActiveSession {
                handle: InterfaceHandle::new(interface, session),
                dual_mode: config.is_dual_band(),
                enabled_reported: false,
                registrations,
            }),
            Err(e) => {
                self.release_registrations(&mut registrations).await;
                Err(e)
            }
        }
    }

    async fn register_and_start(
        &self,
        session: u64,
        config: &SessionConfig,
        interface: &str,
        registrations: &mut Registrations,
    ) -> Result<()> {
        // 1. driver liveness
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .collaborators
            .liveness
            .subscribe(LivenessToken(session), tx)
            .await
            .map_err(|e| SessionError::registration(interface, format!("liveness: {}", e)))?;
        registrations.liveness = Some(Registration {
            id,
            forwarder: forward(rx, self.queue.clone(), move |death| ExecutorInput::DriverDied {
                session,
                death,
            }),
        });

        // 2. interface up/down, then client associations
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .collaborators
            .link
            .subscribe(interface, tx)
            .await
            .map_err(|e| SessionError::registration(interface, format!("link: {}", e)))?;
        registrations.link = Some(Registration {
            id,
            forwarder: forward(rx, self.queue.clone(), move |event| ExecutorInput::LinkChanged {
                session,
                event,
            }),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .collaborators
            .associations
            .subscribe(tx)
            .await
            .map_err(|e| SessionError::registration(interface, format!("associations: {}", e)))?;
        registrations.associations = Some(Registration {
            id,
            forwarder: forward(rx, self.queue.clone(), move |event| ExecutorInput::Association {
                session,
                event,
            }),
        });

        // 3. daemon configuration
        let daemon_config = self.prepare_daemon_config(config).await?;
        match self.collaborators.driver.write_config(&daemon_config).await {
            Ok(true) => debug!(channel = daemon_config.channel, "daemon configured"),
            Ok(false) => return Err(SessionError::daemon_start("daemon rejected configuration")),
            Err(e @ SessionError::ChannelAllocation { .. }) => return Err(e),
            Err(e) => return Err(SessionError::daemon_start(format!("config write: {}", e))),
        }

        // 4. daemon start
        let dual_mode = config.is_dual_band();
        match self.collaborators.driver.start(dual_mode).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SessionError::daemon_start("daemon refused to start")),
            Err(e) => Err(SessionError::daemon_start(format!("start: {}", e))),
        }
    }

    async fn prepare_daemon_config(&self, config: &SessionConfig) -> Result<ApDaemonConfig> {
        if let Some(code) = &self.config.country_code {
            let applied = self.collaborators.channels.set_regulatory_domain(code).await;
            match applied {
                Ok(true) => debug!(country = %code, "regulatory domain applied"),
                _ if config.band == Band::FiveGhz => {
                    return Err(SessionError::daemon_start(format!(
                        "regulatory domain {} is required for 5GHz but could not be applied",
                        code
                    )));
                }
                Ok(false) => warn!(country = %code, "regulatory domain not applied"),
                Err(e) => warn!(country = %code, "regulatory domain not applied: {}", e),
            }
        }

        let channel = if config.channel == AUTO_CHANNEL {
            let allowed = self.config.allowed_channels(config.band);
            self.collaborators
                .channels
                .allocate_channel(config.band, &allowed)
                .await
                .map_err(|e| {
                    warn!(band = %config.band, "channel allocation failed: {}", e);
                    SessionError::ChannelAllocation { band: config.band }
                })?
        } else {
            config.channel
        };

        Ok(ApDaemonConfig {
            ssid: config.ssid.clone(),
            hidden: config.hidden,
            channel,
            auth_mode: config.auth_mode,
            passphrase: config
                .passphrase
                .as_deref()
                .map(|p| p.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }

    /// Started -> Idle. Stop failures are logged; teardown always completes.
    async fn teardown(&mut self, cause: TeardownCause, reports: &mut Vec<ExecutorReport>) {
        let ExecutorState::Started(active) = std::mem::replace(&mut self.state, ExecutorState::Idle)
        else {
            return;
        };
        let ActiveSession {
            handle,
            dual_mode,
            mut registrations,
            ..
        } = active;
        let interface = handle.name().to_string();

        reports.push(ExecutorReport::Disabling {
            interface: interface.clone(),
        });

        match self.collaborators.driver.stop(dual_mode).await {
            Ok(true) => debug!(interface = %interface, "daemon stopped"),
            Ok(false) => warn!(
                interface = %interface,
                "{}",
                SessionError::daemon_stop("daemon reported failure")
            ),
            Err(e) => warn!(interface = %interface, "{}", SessionError::daemon_stop(e.to_string())),
        }

        let report = match cause {
            TeardownCause::Requested => ExecutorReport::Disabled {
                interface: interface.clone(),
            },
            TeardownCause::DriverDied => ExecutorReport::Failed {
                reason: FailureReason::DriverDied,
                interface: Some(interface.clone()),
            },
            TeardownCause::LinkLost => ExecutorReport::Failed {
                reason: FailureReason::GenericStartFailure,
                interface: Some(interface.clone()),
            },
        };

        self.release_registrations(&mut registrations).await;
        handle.release();
        self.tracker.clear();
        self.stats.record_teardown();
        info!(interface = %interface, ?cause, "session torn down");

        reports.push(report);
    }

    async fn release_registrations(&self, registrations: &mut Registrations) {
        if let Some(registration) = registrations.associations.take() {
            registration.forwarder.abort();
            if let Err(e) = self.collaborators.associations.unsubscribe(registration.id).await {
                warn!("association unsubscribe failed: {}", e);
            }
        }
        if let Some(registration) = registrations.link.take() {
            registration.forwarder.abort();
            if let Err(e) = self.collaborators.link.unsubscribe(registration.id).await {
                warn!("link unsubscribe failed: {}", e);
            }
        }
        if let Some(registration) = registrations.liveness.take() {
            registration.forwarder.abort();
            if let Err(e) = self.collaborators.liveness.unsubscribe(registration.id).await {
                warn!("liveness unsubscribe failed: {}", e);
            }
        }
    }
}

fn mark_enabled(active: &mut ActiveSession, stats: &SessionStats, reports: &mut Vec<ExecutorReport>) {
    active.enabled_reported = true;
    stats.record_start_success();
    info!(interface = %active.handle.name(), "access point enabled");
    reports.push(ExecutorReport::Enabled {
        interface: active.handle.name().to_string(),
    });
}

/// Pump a collaborator channel into the radio queue
fn forward<T, F>(mut rx: mpsc::UnboundedReceiver<T>, queue: RadioQueue, wrap: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) -> ExecutorInput + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if !queue.deliver(wrap(item)) {
                break;
            }
        }
    })
}

impl std::fmt::Debug for SessionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionExecutor")
            .field("state", &self.state_name())
            .field("interface", &self.interface_name())
            .field("last_session", &self.last_session)
            .field("tracker", &self.tracker)
            .finish()
    }
}
