use std::time::Instant;

use tracing::debug;

/// Exclusive handle on the network interface backing a started session
///
/// Not cloneable: exactly one exists per session and it is consumed by
/// [`release`](InterfaceHandle::release) when the session returns to Idle.
#[derive(Debug)]
pub struct InterfaceHandle {
    name: String,
    session: u64,
    acquired_at: Instant,
}

impl InterfaceHandle {
    pub(crate) fn new(name: String, session: u64) -> Self {
        Self {
            name,
            session,
            acquired_at: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session generation this handle belongs to
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn release(self) {
        debug!(
            interface = %self.name,
            session = self.session,
            held_for = ?self.acquired_at.elapsed(),
            "interface handle released"
        );
    }
}
