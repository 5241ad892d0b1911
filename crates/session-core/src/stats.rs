//! Session counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::FailureReason;

/// Counters updated by the radio worker
#[derive(Debug, Default)]
pub struct SessionStats {
    enable_requests: AtomicU64,
    starts_succeeded: AtomicU64,
    no_channel_failures: AtomicU64,
    generic_failures: AtomicU64,
    driver_deaths: AtomicU64,
    teardowns: AtomicU64,
    presence_notifications: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub enable_requests: u64,
    pub starts_succeeded: u64,
    pub no_channel_failures: u64,
    pub generic_failures: u64,
    pub driver_deaths: u64,
    pub teardowns: u64,
    pub presence_notifications: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enable_request(&self) {
        self.enable_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Start-result metric: the interface came up and the session was reported enabled
    pub fn record_start_success(&self) {
        self.starts_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, reason: FailureReason) {
        let counter = match reason {
            FailureReason::NoChannelAvailable => &self.no_channel_failures,
            FailureReason::GenericStartFailure => &self.generic_failures,
            FailureReason::DriverDied => &self.driver_deaths,
            FailureReason::None => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_presence_notification(&self) {
        self.presence_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enable_requests: self.enable_requests.load(Ordering::Relaxed),
            starts_succeeded: self.starts_succeeded.load(Ordering::Relaxed),
            no_channel_failures: self.no_channel_failures.load(Ordering::Relaxed),
            generic_failures: self.generic_failures.load(Ordering::Relaxed),
            driver_deaths: self.driver_deaths.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            presence_notifications: self.presence_notifications.load(Ordering::Relaxed),
        }
    }
}
