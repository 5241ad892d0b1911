//! Core types for session-core
//!
//! Session configuration, the public session state, failure reasons and the
//! client records kept by the presence tracker.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Result, SessionError};

/// Maximum SSID length in bytes (IEEE 802.11)
pub const MAX_SSID_LEN: usize = 32;

/// Channel value requesting automatic channel selection
pub const AUTO_CHANNEL: u16 = 0;

/// Authentication mode advertised by the access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No authentication
    Open,
    /// WPA2 personal
    Wpa2Psk,
    /// WPA3 personal
    Wpa3Sae,
    /// WPA3 personal with WPA2 fallback
    Wpa3SaeTransition,
}

impl AuthMode {
    /// Whether this mode needs a passphrase
    pub fn requires_passphrase(&self) -> bool {
        !matches!(self, AuthMode::Open)
    }
}

/// Radio band the access point should operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "2ghz")]
    TwoGhz,
    #[serde(rename = "5ghz")]
    FiveGhz,
    #[serde(rename = "any")]
    Any,
}

impl Band {
    /// Whether `channel` is a legal fixed channel on this band
    pub fn accepts_channel(&self, channel: u16) -> bool {
        match self {
            Band::TwoGhz => (1..=14).contains(&channel),
            Band::FiveGhz => (32..=177).contains(&channel),
            Band::Any => false,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::TwoGhz => write!(f, "2.4GHz"),
            Band::FiveGhz => write!(f, "5GHz"),
            Band::Any => write!(f, "any"),
        }
    }
}

/// Access-point session configuration
///
/// The coordinator keeps its own copy once a session is requested, so later
/// changes to the caller's value never reach an in-flight session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ssid: String,
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub passphrase: Option<String>,
    pub band: Band,
    /// Fixed channel, or [`AUTO_CHANNEL`] to let the channel policy pick one
    #[serde(default)]
    pub channel: u16,
    #[serde(default)]
    pub hidden: bool,
    /// Primary and secondary interfaces when running in dual-band mode
    #[serde(default)]
    pub dual_band_interfaces: Option<(String, String)>,
}

impl SessionConfig {
    /// Open network on 2.4GHz with automatic channel selection
    pub fn new(ssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            auth_mode: AuthMode::Open,
            passphrase: None,
            band: Band::TwoGhz,
            channel: AUTO_CHANNEL,
            hidden: false,
            dual_band_interfaces: None,
        }
    }

    pub fn with_security(mut self, auth_mode: AuthMode, passphrase: impl Into<String>) -> Self {
        self.auth_mode = auth_mode;
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_band(mut self, band: Band) -> Self {
        self.band = band;
        self
    }

    pub fn with_channel(mut self, channel: u16) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_dual_band(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.dual_band_interfaces = Some((primary.into(), secondary.into()));
        self
    }

    /// Whether the daemon has to be driven in dual mode
    pub fn is_dual_band(&self) -> bool {
        self.dual_band_interfaces.is_some()
    }

    /// Check the configuration before any collaborator is touched
    pub fn validate(&self) -> Result<()> {
        if self.ssid.is_empty() {
            return Err(SessionError::config("SSID is missing"));
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(SessionError::config(format!(
                "SSID is {} bytes, at most {} allowed",
                self.ssid.len(),
                MAX_SSID_LEN
            )));
        }

        match (self.auth_mode.requires_passphrase(), self.passphrase.as_deref()) {
            (true, None) => {
                return Err(SessionError::config(format!(
                    "{:?} requires a passphrase",
                    self.auth_mode
                )))
            }
            (true, Some(passphrase)) => validate_passphrase(passphrase)?,
            (false, Some(_)) => {
                return Err(SessionError::config("open network must not carry a passphrase"))
            }
            (false, None) => {}
        }

        if self.channel != AUTO_CHANNEL && !self.band.accepts_channel(self.channel) {
            return Err(SessionError::config(format!(
                "channel {} is not valid for band {}",
                self.channel, self.band
            )));
        }

        if let Some((primary, secondary)) = &self.dual_band_interfaces {
            if primary.is_empty() || secondary.is_empty() || primary == secondary {
                return Err(SessionError::config(
                    "dual-band mode needs two distinct interface names",
                ));
            }
        }

        Ok(())
    }
}

fn validate_passphrase(passphrase: &str) -> Result<()> {
    let len = passphrase.len();
    let is_psk_hex = len == 64 && passphrase.chars().all(|c| c.is_ascii_hexdigit());
    let is_ascii_phrase = (8..=63).contains(&len) && passphrase.chars().all(|c| (' '..='~').contains(&c));

    if is_psk_hex || is_ascii_phrase {
        Ok(())
    } else {
        Err(SessionError::config(
            "passphrase must be 8-63 printable ASCII characters or 64 hex digits",
        ))
    }
}

/// Public state of the access-point session for one radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Enabling,
    Started,
    Disabling,
    Failed,
}

impl SessionState {
    /// Human readable label
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Enabling => "Enabling",
            SessionState::Started => "Started",
            SessionState::Disabling => "Disabling",
            SessionState::Failed => "Failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a session ended up in [`SessionState::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    None,
    NoChannelAvailable,
    GenericStartFailure,
    DriverDied,
}

impl Default for FailureReason {
    fn default() -> Self {
        FailureReason::None
    }
}

/// How the hotspot is being used; carried on every status event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApMode {
    /// Sharing an upstream connection
    Tethered,
    /// Local-only network with no upstream
    LocalOnly,
}

impl Default for ApMode {
    fn default() -> Self {
        ApMode::Tethered
    }
}

/// Parameters handed to the daemon configuration write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApDaemonConfig {
    pub ssid: String,
    pub hidden: bool,
    pub channel: u16,
    pub auth_mode: AuthMode,
    pub passphrase: Vec<u8>,
}

/// 48-bit hardware address
///
/// Parsed from colon or dash separated hex, compared byte-wise and always
/// displayed lowercase with colons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl FromStr for MacAddress {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SessionError::config(format!("invalid MAC address: {}", s));
        let mut octets = [0u8; 6];
        let mut parts = s.split(|c: char| c == ':' || c == '-');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Link-layer state of an associated client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    L2Connected,
    Disconnected,
}

/// A device associated with the access point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub mac: MacAddress,
    pub link_state: LinkState,
    /// Name from the lease registry; `None` once resolution gave up
    pub resolved_name: Option<String>,
    pub first_seen_at: DateTime<Utc>,
}

impl ClientRecord {
    /// Fresh record for a device that just associated
    pub fn connected(mac: MacAddress) -> Self {
        Self {
            mac,
            link_state: LinkState::L2Connected,
            resolved_name: None,
            first_seen_at: Utc::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link_state == LinkState::L2Connected
    }
}
