//! Error types for session-core
//!
//! Every failure on the start path is fatal to that attempt and is reported
//! upward as a [`FailureReason`]. Stop-path failures are logged and swallowed
//! so teardown always completes.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Band, FailureReason};

/// Result type for session-core operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while driving an access-point session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session configuration rejected (bad or missing SSID, bad passphrase, ...)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No channel could be allocated for the requested band
    #[error("No channel available for band {band}")]
    ChannelAllocation { band: Band },

    /// The access-point daemon could not be configured or started
    #[error("Daemon start failed: {message}")]
    DaemonStart { message: String },

    /// The access-point daemon did not stop cleanly (non-fatal)
    #[error("Daemon stop failed: {message}")]
    DaemonStop { message: String },

    /// The remote driver handle died
    #[error("Driver liveness lost")]
    LivenessLost,

    /// Registration with a link-state or liveness source failed
    #[error("Observer registration failed for {interface}: {message}")]
    LinkObserverRegistration { interface: String, message: String },

    /// A remote call to an external collaborator failed
    #[error("{operation} failed: {message}")]
    Collaborator { operation: String, message: String },

    /// The lease registry could not be read
    #[error("Failed to read lease registry {}: {source}", path.display())]
    Lease {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The coordinator configuration file could not be loaded
    #[error("Invalid coordinator configuration: {message}")]
    ConfigFile { message: String },

    /// The radio worker has stopped; no further requests are accepted
    #[error("Radio worker is not running")]
    WorkerStopped,
}

impl SessionError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a daemon start error
    pub fn daemon_start(message: impl Into<String>) -> Self {
        Self::DaemonStart {
            message: message.into(),
        }
    }

    /// Create a daemon stop error
    pub fn daemon_stop(message: impl Into<String>) -> Self {
        Self::DaemonStop {
            message: message.into(),
        }
    }

    /// Create an observer registration error
    pub fn registration(interface: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LinkObserverRegistration {
            interface: interface.into(),
            message: message.into(),
        }
    }

    /// Create a collaborator (remote call) error
    pub fn collaborator(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration-file error
    pub fn config_file(message: impl Into<String>) -> Self {
        Self::ConfigFile {
            message: message.into(),
        }
    }

    /// The reason reported upward when this error aborts a session
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::ChannelAllocation { .. } => FailureReason::NoChannelAvailable,
            Self::LivenessLost => FailureReason::DriverDied,
            _ => FailureReason::GenericStartFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_failure_reasons() {
        assert_eq!(
            SessionError::ChannelAllocation { band: Band::FiveGhz }.failure_reason(),
            FailureReason::NoChannelAvailable
        );
        assert_eq!(SessionError::LivenessLost.failure_reason(), FailureReason::DriverDied);
        assert_eq!(
            SessionError::daemon_start("hostapd exited").failure_reason(),
            FailureReason::GenericStartFailure
        );
        assert_eq!(
            SessionError::registration("wlan1", "netlink closed").failure_reason(),
            FailureReason::GenericStartFailure
        );
    }

    #[test]
    fn messages_name_the_operation() {
        let err = SessionError::collaborator("write_config", "binder transaction failed");
        assert_eq!(err.to_string(), "write_config failed: binder transaction failed");
    }
}
