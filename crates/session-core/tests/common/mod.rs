//! Shared helpers for session-core integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use softap_session_core::prelude::*;
use softap_session_core::sim::{RecordingNotifier, SimulatedRadio};
use tempfile::NamedTempFile;
use tokio::sync::broadcast;

pub const INTERFACE: &str = "wlan0";
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// A coordinator wired to a simulated radio
pub struct Harness {
    pub coordinator: SessionCoordinator,
    pub radio: Arc<SimulatedRadio>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: broadcast::Receiver<StatusChange>,
    pub leases: NamedTempFile,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_radio(SimulatedRadio::new(INTERFACE), CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self::with_radio(SimulatedRadio::new(INTERFACE), config)
    }

    /// Name polls run every 20ms; the lease file is an empty temp file
    pub fn with_radio(radio: SimulatedRadio, config: CoordinatorConfig) -> Self {
        init_logging();
        let leases = NamedTempFile::new().expect("lease file");
        let config = config
            .with_lease_file(leases.path())
            .with_name_polling(Duration::from_millis(20), 5);

        let radio = Arc::new(radio);
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = SessionCoordinator::builder()
            .with_config(config)
            .with_radio(radio.clone())
            .with_presence_notifier(notifier.clone())
            .build()
            .expect("coordinator");
        let events = coordinator.subscribe_events();

        Self {
            coordinator,
            radio,
            notifier,
            events,
            leases,
        }
    }

    /// Next published status change
    pub async fn next_event(&mut self) -> StatusChange {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("status change in time")
            .expect("event channel open")
    }

    /// Collect the next `count` new states
    pub async fn next_states(&mut self, count: usize) -> Vec<SessionState> {
        let mut states = Vec::with_capacity(count);
        for _ in 0..count {
            states.push(self.next_event().await.new_state);
        }
        states
    }

    /// Assert that nothing is published for a short while
    pub async fn expect_quiet(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(150), self.events.recv()).await;
        assert!(result.is_err(), "unexpected status change: {:?}", result);
    }

    /// Enable and wait for Started
    pub async fn start(&mut self, config: &SessionConfig) {
        self.coordinator.request_enable(config).expect("enable");
        assert_eq!(
            self.next_states(2).await,
            vec![SessionState::Enabling, SessionState::Started]
        );
    }

    pub fn add_lease(&mut self, mac: &str, name: &str) {
        writeln!(
            self.leases,
            "1718031112 {} 192.168.43.17 {} 01:{}",
            mac, name, mac
        )
        .expect("write lease");
        self.leases.flush().expect("flush lease");
    }
}

/// Route library logs to the test harness; safe to call repeatedly
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn guest_network() -> SessionConfig {
    SessionConfig::new("guest").with_security(AuthMode::Wpa2Psk, "correct horse battery")
}

pub fn mac(raw: &str) -> MacAddress {
    raw.parse().expect("valid mac")
}

/// Poll `condition` until it holds or the timeout expires
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
