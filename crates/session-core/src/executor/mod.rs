//! Session Executor
//!
//! Two-state machine (Idle, Started) that owns the daemon lifecycle and the
//! interface handle for one radio. It consumes [`ExecutorInput`]s one at a
//! time and answers each with the [`ExecutorReport`]s the coordinator needs
//! to update the public state.

mod executor;
pub mod handle;

pub use executor::SessionExecutor;
pub use handle::InterfaceHandle;

use crate::adapters::{AssociationEvent, DriverDeath, LinkEvent};
use crate::presence::NameResolution;
use crate::types::{FailureReason, SessionConfig};

/// Commands forwarded by the coordinator
#[derive(Debug, Clone)]
pub enum ExecutorCommand {
    Start(SessionConfig),
    Stop,
}

/// Everything the executor reacts to
///
/// Collaborator events are tagged with the session generation they were
/// registered for; events from an earlier session are dropped.
#[derive(Debug, Clone)]
pub enum ExecutorInput {
    Command(ExecutorCommand),
    LinkChanged { session: u64, event: LinkEvent },
    DriverDied { session: u64, death: DriverDeath },
    Association { session: u64, event: AssociationEvent },
    NameResolved(NameResolution),
}

/// State changes reported back to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorReport {
    /// The interface is up; reported once per session
    Enabled { interface: String },
    Disabling { interface: String },
    Disabled { interface: String },
    Failed {
        reason: FailureReason,
        interface: Option<String>,
    },
}
