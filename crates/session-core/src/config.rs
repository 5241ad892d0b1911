//! Coordinator configuration
//!
//! Everything here is fixed for the lifetime of a coordinator. Per-session
//! settings (SSID, band, ...) live in [`SessionConfig`](crate::types::SessionConfig).
//!
//! ```rust
//! use softap_session_core::config::{CoordinatorConfig, LinkDownPolicy};
//!
//! let config = CoordinatorConfig::from_toml_str(r#"
//!     mode = "local_only"
//!     lease_file = "/tmp/dnsmasq.leases"
//!     name_poll_interval_ms = 500
//!     link_down_policy = "teardown"
//! "#).unwrap();
//!
//! assert_eq!(config.name_poll_interval_ms, 500);
//! assert_eq!(config.link_down_policy, LinkDownPolicy::Teardown);
//! assert_eq!(config.name_poll_max_attempts, 10);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::types::{ApMode, Band};

/// Default dnsmasq lease database
pub const DEFAULT_LEASE_FILE: &str = "/var/lib/misc/dnsmasq.leases";

/// What to do when the interface goes down after the session was reported enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDownPolicy {
    /// Log the event and keep the session
    Ignore,
    /// Tear the session down and report `Failed(GenericStartFailure)`
    Teardown,
}

impl Default for LinkDownPolicy {
    fn default() -> Self {
        LinkDownPolicy::Ignore
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub mode: ApMode,
    pub lease_file: PathBuf,
    pub name_poll_interval_ms: u64,
    pub name_poll_max_attempts: u32,
    /// Regulatory domain applied before channel allocation
    pub country_code: Option<String>,
    pub allowed_channels_2g: Vec<u16>,
    pub allowed_channels_5g: Vec<u16>,
    pub link_down_policy: LinkDownPolicy,
    /// Buffer size of the status broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            mode: ApMode::Tethered,
            lease_file: PathBuf::from(DEFAULT_LEASE_FILE),
            name_poll_interval_ms: 1000,
            name_poll_max_attempts: 10,
            country_code: None,
            allowed_channels_2g: (1..=11).collect(),
            allowed_channels_5g: vec![36, 40, 44, 48, 149, 153, 157, 161],
            link_down_policy: LinkDownPolicy::Ignore,
            event_channel_capacity: 64,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| SessionError::config_file(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SessionError::config_file(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn with_mode(mut self, mode: ApMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_lease_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lease_file = path.into();
        self
    }

    pub fn with_name_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.name_poll_interval_ms = interval.as_millis() as u64;
        self.name_poll_max_attempts = max_attempts;
        self
    }

    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    pub fn with_link_down_policy(mut self, policy: LinkDownPolicy) -> Self {
        self.link_down_policy = policy;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn name_poll_interval(&self) -> Duration {
        Duration::from_millis(self.name_poll_interval_ms)
    }

    /// Channels the policy may pick from for `band`
    pub fn allowed_channels(&self, band: Band) -> Vec<u16> {
        match band {
            Band::TwoGhz => self.allowed_channels_2g.clone(),
            Band::FiveGhz => self.allowed_channels_5g.clone(),
            Band::Any => self
                .allowed_channels_2g
                .iter()
                .chain(self.allowed_channels_5g.iter())
                .copied()
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name_poll_interval_ms == 0 {
            return Err(SessionError::config_file("name_poll_interval_ms must be positive"));
        }
        if self.name_poll_max_attempts == 0 {
            return Err(SessionError::config_file("name_poll_max_attempts must be positive"));
        }
        if self.allowed_channels_2g.is_empty() && self.allowed_channels_5g.is_empty() {
            return Err(SessionError::config_file("no allowed channels configured"));
        }
        if self.event_channel_capacity == 0 {
            return Err(SessionError::config_file("event_channel_capacity must be positive"));
        }
        if let Some(code) = &self.country_code {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(SessionError::config_file(format!(
                    "country_code '{}' is not an ISO 3166 alpha-2 code",
                    code
                )));
            }
        }
        Ok(())
    }
}
