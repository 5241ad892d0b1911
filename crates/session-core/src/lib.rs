//! # SoftAP Session Core
//!
//! Lifecycle control for one access-point radio:
//! - **coordinator**: public enable/disable API, session state and status events
//! - **executor**: daemon bring-up and teardown, link and driver liveness tracking
//! - **presence**: connected clients and their lease-resolved host names
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use softap_session_core::prelude::*;
//! use softap_session_core::sim::SimulatedRadio;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let coordinator = SessionCoordinator::builder()
//!         .with_config(CoordinatorConfig::default())
//!         .with_radio(Arc::new(SimulatedRadio::new("wlan0")))
//!         .build()?;
//!
//!     let mut events = coordinator.subscribe_events();
//!     coordinator.request_enable(
//!         &SessionConfig::new("guest").with_security(AuthMode::Wpa2Psk, "correct horse"),
//!     )?;
//!
//!     while let Ok(change) = events.recv().await {
//!         println!("{} -> {}", change.previous_state, change.new_state);
//!         if change.new_state == SessionState::Started {
//!             break;
//!         }
//!     }
//!
//!     coordinator.shutdown().await
//! }
//! ```
//!
//! ## Architecture
//!
//! Every control request and every collaborator event for a radio passes
//! through one queue and is handled in order by a single worker task. The
//! last published state is mirrored into an atomically swapped snapshot so
//! callers can read it without waiting on that worker.

pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod executor;
pub mod presence;
pub mod queue;
pub mod sim;
pub mod stats;
pub mod types;

pub use config::{CoordinatorConfig, LinkDownPolicy};
pub use coordinator::{SessionCoordinator, SessionCoordinatorBuilder, StatusSnapshot};
pub use errors::{Result, SessionError};
pub use events::{StatusChange, StatusListener};
pub use types::{
    ApMode, AuthMode, Band, ClientRecord, FailureReason, LinkState, MacAddress, SessionConfig,
    SessionState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::adapters::{
        ApDriver, AssociationSource, ChannelPolicy, Collaborators, LinkMonitor, LivenessMonitor,
        PresenceNotifier,
    };
    pub use crate::config::{CoordinatorConfig, LinkDownPolicy};
    pub use crate::coordinator::{SessionCoordinator, SessionCoordinatorBuilder, StatusSnapshot};
    pub use crate::errors::{Result, SessionError};
    pub use crate::events::{StatusChange, StatusListener};
    pub use crate::stats::StatsSnapshot;
    pub use crate::types::{
        ApMode, AuthMode, Band, ClientRecord, FailureReason, LinkState, MacAddress,
        SessionConfig, SessionState,
    };
}
