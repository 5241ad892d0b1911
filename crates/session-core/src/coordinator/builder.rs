//! Builder for [`SessionCoordinator`]

use std::sync::Arc;

use super::coordinator::SessionCoordinator;
use crate::adapters::{
    ApDriver, AssociationSource, ChannelPolicy, Collaborators, LinkMonitor, LivenessMonitor,
    PresenceNotifier,
};
use crate::config::CoordinatorConfig;
use crate::errors::{Result, SessionError};
use crate::events::StatusListener;

/// Presence notifier used when none is configured
#[derive(Debug, Default)]
pub struct LoggingNotifier;

impl PresenceNotifier for LoggingNotifier {
    fn presence_changed(&self, connected: usize) {
        tracing::info!(connected, "connected client count changed");
    }
}

/// Assembles a coordinator from its configuration and collaborators
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use softap_session_core::prelude::*;
/// use softap_session_core::sim::SimulatedRadio;
///
/// # async fn example() -> Result<()> {
/// let radio = Arc::new(SimulatedRadio::new("wlan0"));
/// let coordinator = SessionCoordinator::builder()
///     .with_config(CoordinatorConfig::default())
///     .with_radio(radio)
///     .build()?;
///
/// coordinator.request_enable(&SessionConfig::new("guest"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SessionCoordinatorBuilder {
    config: CoordinatorConfig,
    driver: Option<Arc<dyn ApDriver>>,
    channels: Option<Arc<dyn ChannelPolicy>>,
    link: Option<Arc<dyn LinkMonitor>>,
    liveness: Option<Arc<dyn LivenessMonitor>>,
    associations: Option<Arc<dyn AssociationSource>>,
    notifier: Option<Arc<dyn PresenceNotifier>>,
    listeners: Vec<Arc<dyn StatusListener>>,
}

impl SessionCoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use one object for every radio-side collaborator
    pub fn with_radio<R>(mut self, radio: Arc<R>) -> Self
    where
        R: ApDriver + ChannelPolicy + LinkMonitor + LivenessMonitor + AssociationSource + 'static,
    {
        self.driver = Some(radio.clone());
        self.channels = Some(radio.clone());
        self.link = Some(radio.clone());
        self.liveness = Some(radio.clone());
        self.associations = Some(radio);
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.driver = Some(collaborators.driver);
        self.channels = Some(collaborators.channels);
        self.link = Some(collaborators.link);
        self.liveness = Some(collaborators.liveness);
        self.associations = Some(collaborators.associations);
        self.notifier = Some(collaborators.notifier);
        self
    }

    pub fn with_driver(mut self, driver: Arc<dyn ApDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_channel_policy(mut self, channels: Arc<dyn ChannelPolicy>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_link_monitor(mut self, link: Arc<dyn LinkMonitor>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_liveness_monitor(mut self, liveness: Arc<dyn LivenessMonitor>) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn with_association_source(mut self, associations: Arc<dyn AssociationSource>) -> Self {
        self.associations = Some(associations);
        self
    }

    pub fn with_presence_notifier(mut self, notifier: Arc<dyn PresenceNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Listeners are called in registration order for every status change
    pub fn with_listener(mut self, listener: Arc<dyn StatusListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the configuration and start the radio worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<SessionCoordinator> {
        self.config.validate()?;

        let collaborators = Collaborators {
            driver: required(self.driver, "ap driver")?,
            channels: required(self.channels, "channel policy")?,
            link: required(self.link, "link monitor")?,
            liveness: required(self.liveness, "liveness monitor")?,
            associations: required(self.associations, "association source")?,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LoggingNotifier)),
        };

        SessionCoordinator::spawn(self.config, collaborators, self.listeners)
    }
}

fn required<T: ?Sized>(value: Option<Arc<T>>, what: &str) -> Result<Arc<T>> {
    value.ok_or_else(|| SessionError::config_file(format!("{} not set", what)))
}
