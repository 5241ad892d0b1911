//! Access-point driver and channel policy contracts

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{ApDaemonConfig, Band};

/// Control surface of the access-point daemon
///
/// `Ok(false)` and `Err(_)` are both failures; the error form carries the
/// remote-call failure when there is one.
#[async_trait]
pub trait ApDriver: Send + Sync {
    /// Write the daemon configuration (SSID, channel, hidden flag, security)
    async fn write_config(&self, config: &ApDaemonConfig) -> Result<bool>;

    /// Start the daemon, in dual mode for dual-band sessions
    async fn start(&self, dual_mode: bool) -> Result<bool>;

    /// Stop the daemon
    async fn stop(&self, dual_mode: bool) -> Result<bool>;

    /// Name of the network interface the daemon brings up
    async fn interface_name(&self) -> Result<String>;
}

/// Country and channel policy
#[async_trait]
pub trait ChannelPolicy: Send + Sync {
    /// Apply an ISO 3166 regulatory domain
    async fn set_regulatory_domain(&self, country_code: &str) -> Result<bool>;

    /// Pick a channel on `band` from `allowed`.
    ///
    /// Fails with [`SessionError::ChannelAllocation`](crate::errors::SessionError::ChannelAllocation)
    /// when nothing usable is left.
    async fn allocate_channel(&self, band: Band, allowed: &[u16]) -> Result<u16>;
}
