//! Event sources observed during a session and the presence notifier
//!
//! Sources deliver into the unbounded sender handed over at subscription
//! time. Dropping the subscription on the source side simply closes that
//! sender.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::MacAddress;

/// Identifies one registration with an event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Interface up/down notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub interface: String,
    pub is_up: bool,
}

/// Token registered with the liveness source; echoed back on death
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LivenessToken(pub u64);

/// The driver handle registered with `token` died
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverDeath {
    pub token: LivenessToken,
}

/// A client associated with or left the access point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationEvent {
    pub mac: MacAddress,
    pub connected: bool,
}

/// OS network-interface change notifications
#[async_trait]
pub trait LinkMonitor: Send + Sync {
    /// Watch `interface`, which may not exist yet
    async fn subscribe(
        &self,
        interface: &str,
        sink: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<SubscriptionId>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Current link state, `true` when up
    async fn query_link_state(&self, interface: &str) -> Result<bool>;
}

/// Death notifications for the remote driver handle
#[async_trait]
pub trait LivenessMonitor: Send + Sync {
    async fn subscribe(
        &self,
        token: LivenessToken,
        sink: mpsc::UnboundedSender<DriverDeath>,
    ) -> Result<SubscriptionId>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}

/// Client association events reported by the daemon
#[async_trait]
pub trait AssociationSource: Send + Sync {
    async fn subscribe(&self, sink: mpsc::UnboundedSender<AssociationEvent>) -> Result<SubscriptionId>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}

/// Receives "presence changed" notifications
///
/// Implementations recompute and redisplay the device count; redundant calls
/// must be harmless.
pub trait PresenceNotifier: Send + Sync {
    fn presence_changed(&self, connected_devices: usize);
}
