//! Common infrastructure for the SoftAP stack
//!
//! Shared pieces that every crate in the workspace leans on:
//!
//! - [`logging`]: tracing subscriber setup and log contexts
//! - [`errors`]: the infrastructure error type

pub mod errors;
pub mod logging;

pub use errors::types::{Error, Result};
pub use logging::context::LogContext;
pub use logging::setup::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
