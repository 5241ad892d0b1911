//! Adapters for the external collaborators of a session
//!
//! The executor never talks to hardware directly. It drives the access-point
//! daemon, the channel policy and the various event sources through the
//! traits defined here, and owns them for the lifetime of a session.

pub mod driver;
pub mod observers;

use std::sync::Arc;

pub use driver::{ApDriver, ChannelPolicy};
pub use observers::{
    AssociationEvent, AssociationSource, DriverDeath, LinkEvent, LinkMonitor, LivenessMonitor,
    LivenessToken, PresenceNotifier, SubscriptionId,
};

/// Every collaborator one radio needs
#[derive(Clone)]
pub struct Collaborators {
    pub driver: Arc<dyn ApDriver>,
    pub channels: Arc<dyn ChannelPolicy>,
    pub link: Arc<dyn LinkMonitor>,
    pub liveness: Arc<dyn LivenessMonitor>,
    pub associations: Arc<dyn AssociationSource>,
    pub notifier: Arc<dyn PresenceNotifier>,
}

impl Collaborators {
    /// Use one object for every radio-side collaborator
    pub fn from_radio<R>(radio: Arc<R>, notifier: Arc<dyn PresenceNotifier>) -> Self
    where
        R: ApDriver + ChannelPolicy + LinkMonitor + LivenessMonitor + AssociationSource + 'static,
    {
        Self {
            driver: radio.clone(),
            channels: radio.clone(),
            link: radio.clone(),
            liveness: radio.clone(),
            associations: radio,
            notifier,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
