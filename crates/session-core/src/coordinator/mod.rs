//! Session Coordinator
//!
//! Public face of one radio. Accepts enable/disable intents, owns the
//! outward-facing session state and publishes every transition. All work
//! happens on a single radio worker that also hosts the
//! [`SessionExecutor`](crate::executor::SessionExecutor).

mod builder;
mod coordinator;
mod event_handler;

pub use builder::{LoggingNotifier, SessionCoordinatorBuilder};
pub use coordinator::{SessionCoordinator, StatusSnapshot};
