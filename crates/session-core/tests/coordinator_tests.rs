//! End-to-end tests for SessionCoordinator against a simulated radio
//!
//! Covers:
//! - Enable/disable lifecycle and the published event sequence
//! - Start failures and the explicit reset out of Failed
//! - Driver death and link-down handling
//! - Shutdown and listener ordering

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{eventually, guest_network, mac, Harness, INTERFACE};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use softap_session_core::prelude::*;
use softap_session_core::sim::{SimFault, SimulatedRadio};

#[tokio::test]
async fn enable_reports_enabling_then_started() {
    let mut h = Harness::new();
    assert_eq!(h.coordinator.current_state(), SessionState::Idle);

    h.coordinator.request_enable(&guest_network()).unwrap();

    let enabling = h.next_event().await;
    assert_eq!(enabling.previous_state, SessionState::Idle);
    assert_eq!(enabling.new_state, SessionState::Enabling);

    let started = h.next_event().await;
    assert_eq!(started.previous_state, SessionState::Enabling);
    assert_eq!(started.new_state, SessionState::Started);
    assert_eq!(started.failure_reason, FailureReason::None);
    assert_eq!(started.interface_name.as_deref(), Some(INTERFACE));

    assert_eq!(h.coordinator.current_state(), SessionState::Started);
    assert_eq!(h.coordinator.current_state_name(), "Started");
    assert_eq!(h.coordinator.status().interface_name.as_deref(), Some(INTERFACE));
    assert!(h.radio.is_running());
}

#[tokio::test]
async fn published_change_serializes_for_external_consumers() {
    let mut h = Harness::new();
    h.coordinator.request_enable(&guest_network()).unwrap();
    h.next_event().await;
    let started = h.next_event().await;

    let json = serde_json::to_value(&started).unwrap();
    assert_eq!(json["new_state"], "Started");
    assert_eq!(json["previous_state"], "Enabling");
    assert_eq!(json["failure_reason"], "None");
    assert_eq!(json["interface_name"], INTERFACE);
    assert_eq!(json["mode"], "tethered");

    let parsed: StatusChange = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, started);
}

#[tokio::test]
async fn daemon_receives_session_settings() {
    let mut h = Harness::new();
    h.start(&guest_network().with_hidden(true)).await;

    let written = h.radio.last_config().expect("config written");
    assert_eq!(written.ssid, "guest");
    assert!(written.hidden);
    assert_eq!(written.auth_mode, AuthMode::Wpa2Psk);
    assert_eq!(written.passphrase, b"correct horse battery".to_vec());
    // first allowed 2.4GHz channel
    assert_eq!(written.channel, 1);
    assert!(!h.radio.last_dual_mode());
}

#[tokio::test]
async fn fixed_channel_skips_allocation() {
    let mut h = Harness::new();
    h.radio.inject(SimFault::ChannelAllocation);

    h.start(&guest_network().with_channel(6)).await;
    assert_eq!(h.radio.last_config().unwrap().channel, 6);
}

#[tokio::test]
async fn five_ghz_allocates_from_five_ghz_list() {
    let mut h = Harness::new();
    h.start(&guest_network().with_band(Band::FiveGhz)).await;
    assert_eq!(h.radio.last_config().unwrap().channel, 36);
}

#[tokio::test]
async fn repeated_link_up_publishes_nothing() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;

    h.radio.set_link(true);
    h.radio.set_link(true);
    h.expect_quiet().await;
    assert_eq!(h.coordinator.stats().starts_succeeded, 1);
}

#[tokio::test]
async fn enable_while_started_is_ignored() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;

    h.coordinator.request_enable(&guest_network()).unwrap();
    h.expect_quiet().await;
    assert_eq!(h.radio.start_calls(), 1);
    assert_eq!(h.coordinator.current_state(), SessionState::Started);
}

#[tokio::test]
async fn interface_up_after_start_enables() {
    let radio = SimulatedRadio::new(INTERFACE).with_auto_link_up(false);
    let mut h = Harness::with_radio(radio, CoordinatorConfig::default());

    h.coordinator.request_enable(&guest_network()).unwrap();
    assert_eq!(h.next_event().await.new_state, SessionState::Enabling);
    h.expect_quiet().await;
    assert_eq!(h.coordinator.current_state(), SessionState::Enabling);

    h.radio.set_link(true);
    assert_eq!(h.next_event().await.new_state, SessionState::Started);
}

#[tokio::test]
async fn disable_returns_to_idle_and_releases_everything() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;
    assert_eq!(h.radio.active_subscriptions(), 3);

    h.coordinator.request_disable().unwrap();
    let disabling = h.next_event().await;
    assert_eq!(disabling.new_state, SessionState::Disabling);
    assert_eq!(disabling.interface_name.as_deref(), Some(INTERFACE));
    assert_eq!(h.next_event().await.new_state, SessionState::Idle);

    assert_eq!(h.radio.stop_calls(), 1);
    assert!(!h.radio.is_running());
    assert_eq!(h.radio.active_subscriptions(), 0);
    assert_eq!(h.coordinator.status().interface_name, None);
}

#[tokio::test]
async fn disable_while_idle_is_a_no_op() {
    let mut h = Harness::new();
    h.coordinator.request_disable().unwrap();
    h.expect_quiet().await;
    assert_eq!(h.radio.stop_calls(), 0);
}

#[tokio::test]
async fn disable_while_enabling_tears_down() {
    let radio = SimulatedRadio::new(INTERFACE).with_auto_link_up(false);
    let mut h = Harness::with_radio(radio, CoordinatorConfig::default());

    h.add_lease("aa:bb:cc:dd:ee:01", "pixel-7");

    h.coordinator.request_enable(&guest_network()).unwrap();
    assert_eq!(h.next_event().await.new_state, SessionState::Enabling);

    // The daemon is up while the link is still down; clients can already join
    h.radio.associate(mac("aa:bb:cc:dd:ee:01"));
    assert!(eventually(|| h.notifier.calls() == 1).await);
    assert_eq!(h.coordinator.connected_devices().await.unwrap().len(), 1);

    h.coordinator.request_disable().unwrap();
    assert_eq!(
        h.next_states(2).await,
        vec![SessionState::Disabling, SessionState::Idle]
    );
    assert!(!h.radio.is_running());
    assert_eq!(h.radio.active_subscriptions(), 0);
    assert_eq!(h.coordinator.status().interface_name, None);
    assert!(h.coordinator.connected_devices().await.unwrap().is_empty());
}

#[tokio::test]
async fn session_can_be_restarted() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;
    h.coordinator.request_disable().unwrap();
    h.next_states(2).await;

    h.start(&guest_network()).await;
    assert_eq!(h.radio.start_calls(), 2);
    assert_eq!(h.radio.active_subscriptions(), 3);
}

#[tokio::test]
async fn channel_allocation_failure_reports_no_channel() {
    let mut h = Harness::new();
    h.radio.inject(SimFault::ChannelAllocation);

    h.coordinator.request_enable(&guest_network()).unwrap();
    assert_eq!(h.next_event().await.new_state, SessionState::Enabling);

    let failed = h.next_event().await;
    assert_eq!(failed.new_state, SessionState::Failed);
    assert_eq!(failed.failure_reason, FailureReason::NoChannelAvailable);
    assert_eq!(h.coordinator.current_state(), SessionState::Failed);
    assert_eq!(h.coordinator.status().failure_reason, FailureReason::NoChannelAvailable);
    assert_eq!(h.radio.start_calls(), 0);
    assert_eq!(h.radio.active_subscriptions(), 0);
    assert_eq!(h.coordinator.stats().no_channel_failures, 1);
}

#[tokio::test]
async fn failed_requires_disable_before_enable() {
    let mut h = Harness::new();
    h.radio.inject(SimFault::Start);
    h.coordinator.request_enable(&guest_network()).unwrap();
    assert_eq!(
        h.next_states(2).await,
        vec![SessionState::Enabling, SessionState::Failed]
    );

    h.radio.clear_faults();
    h.coordinator.request_enable(&guest_network()).unwrap();
    h.expect_quiet().await;
    assert_eq!(h.coordinator.current_state(), SessionState::Failed);

    h.coordinator.request_disable().unwrap();
    let reset = h.next_event().await;
    assert_eq!(reset.previous_state, SessionState::Failed);
    assert_eq!(reset.new_state, SessionState::Idle);
    assert_eq!(reset.failure_reason, FailureReason::None);

    h.start(&guest_network()).await;
}

#[tokio::test]
async fn invalid_session_config_fails_before_touching_the_radio() {
    let mut h = Harness::new();
    h.coordinator.request_enable(&SessionConfig::new("")).unwrap();

    assert_eq!(h.next_event().await.new_state, SessionState::Enabling);
    let failed = h.next_event().await;
    assert_eq!(failed.new_state, SessionState::Failed);
    assert_eq!(failed.failure_reason, FailureReason::GenericStartFailure);
    assert_eq!(h.radio.write_calls(), 0);
    assert_eq!(h.radio.active_subscriptions(), 0);
}

#[tokio::test]
async fn registration_failure_releases_earlier_registrations() {
    for fault in [
        SimFault::LivenessRegistration,
        SimFault::LinkRegistration,
        SimFault::AssociationRegistration,
    ] {
        let mut h = Harness::new();
        h.radio.inject(fault);
        h.coordinator.request_enable(&guest_network()).unwrap();

        assert_eq!(
            h.next_states(2).await,
            vec![SessionState::Enabling, SessionState::Failed],
            "{:?}",
            fault
        );
        assert_eq!(h.radio.active_subscriptions(), 0, "{:?}", fault);
        assert_eq!(h.radio.start_calls(), 0, "{:?}", fault);
    }
}

#[tokio::test]
async fn daemon_failures_report_generic_start_failure() {
    for fault in [
        SimFault::InterfaceName,
        SimFault::WriteConfig,
        SimFault::WriteConfigRejected,
        SimFault::Start,
    ] {
        let mut h = Harness::new();
        h.radio.inject(fault);
        h.coordinator.request_enable(&guest_network()).unwrap();

        h.next_event().await;
        let failed = h.next_event().await;
        assert_eq!(failed.new_state, SessionState::Failed, "{:?}", fault);
        assert_eq!(failed.failure_reason, FailureReason::GenericStartFailure, "{:?}", fault);
        assert!(!h.radio.is_running(), "{:?}", fault);
    }
}

#[tokio::test]
async fn regulatory_domain_is_only_fatal_on_five_ghz() {
    let config = CoordinatorConfig::default().with_country_code("DE");

    let mut h = Harness::with_config(config.clone());
    h.start(&guest_network()).await;
    assert_eq!(h.radio.regulatory_domain().as_deref(), Some("DE"));

    let mut h = Harness::with_config(config.clone());
    h.radio.inject(SimFault::RegulatoryDomain);
    h.start(&guest_network()).await;

    let mut h = Harness::with_config(config);
    h.radio.inject(SimFault::RegulatoryDomain);
    h.coordinator
        .request_enable(&guest_network().with_band(Band::FiveGhz))
        .unwrap();
    assert_eq!(
        h.next_states(2).await,
        vec![SessionState::Enabling, SessionState::Failed]
    );
}

#[tokio::test]
async fn driver_death_tears_down_and_fails() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;

    h.radio.kill_driver();

    let disabling = h.next_event().await;
    assert_eq!(disabling.new_state, SessionState::Disabling);
    let failed = h.next_event().await;
    assert_eq!(failed.new_state, SessionState::Failed);
    assert_eq!(failed.failure_reason, FailureReason::DriverDied);
    assert_eq!(failed.interface_name.as_deref(), Some(INTERFACE));

    assert_eq!(h.radio.active_subscriptions(), 0);
    assert_eq!(h.coordinator.status().interface_name, None);
    assert!(h.coordinator.connected_devices().await.unwrap().is_empty());
    assert_eq!(h.coordinator.stats().driver_deaths, 1);
}

#[tokio::test]
async fn stop_failure_still_completes_teardown() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;
    h.radio.inject(SimFault::Stop);

    h.coordinator.request_disable().unwrap();
    assert_eq!(
        h.next_states(2).await,
        vec![SessionState::Disabling, SessionState::Idle]
    );
    assert_eq!(h.radio.active_subscriptions(), 0);
}

#[tokio::test]
async fn link_down_is_ignored_by_default() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;

    h.radio.set_link(false);
    h.expect_quiet().await;
    assert_eq!(h.coordinator.current_state(), SessionState::Started);
}

#[tokio::test]
async fn link_down_tears_down_under_teardown_policy() {
    let config = CoordinatorConfig::default().with_link_down_policy(LinkDownPolicy::Teardown);
    let mut h = Harness::with_config(config);
    h.start(&guest_network()).await;

    h.radio.set_link(false);
    assert_eq!(h.next_event().await.new_state, SessionState::Disabling);
    let failed = h.next_event().await;
    assert_eq!(failed.new_state, SessionState::Failed);
    assert_eq!(failed.failure_reason, FailureReason::GenericStartFailure);
}

#[tokio::test]
async fn link_down_before_enabled_never_tears_down() {
    let config = CoordinatorConfig::default().with_link_down_policy(LinkDownPolicy::Teardown);
    let radio = SimulatedRadio::new(INTERFACE).with_auto_link_up(false);
    let mut h = Harness::with_radio(radio, config);

    h.coordinator.request_enable(&guest_network()).unwrap();
    assert_eq!(h.next_event().await.new_state, SessionState::Enabling);

    h.radio.set_link(false);
    h.expect_quiet().await;

    h.radio.set_link(true);
    assert_eq!(h.next_event().await.new_state, SessionState::Started);
}

#[tokio::test]
async fn dual_band_starts_daemon_in_dual_mode() {
    let mut h = Harness::new();
    h.start(&guest_network().with_dual_band("wlan0", "wlan1")).await;
    assert!(h.radio.last_dual_mode());
}

#[tokio::test]
async fn events_carry_the_configured_mode() {
    let mut h = Harness::with_config(CoordinatorConfig::default().with_mode(ApMode::LocalOnly));
    h.coordinator.request_enable(&guest_network()).unwrap();
    assert_eq!(h.next_event().await.mode, ApMode::LocalOnly);
    assert_eq!(h.coordinator.mode(), ApMode::LocalOnly);
}

#[tokio::test]
async fn caller_changes_after_enable_do_not_leak() {
    let mut h = Harness::new();
    let mut config = guest_network();
    h.coordinator.request_enable(&config).unwrap();
    config.ssid = "changed".to_string();

    h.next_states(2).await;
    assert_eq!(h.radio.last_config().unwrap().ssid, "guest");
}

#[derive(Default)]
struct RecordingListener {
    seen: Mutex<Vec<SessionState>>,
}

#[async_trait]
impl StatusListener for RecordingListener {
    async fn on_status_changed(&self, change: &StatusChange) {
        self.seen.lock().push(change.new_state);
    }
}

#[tokio::test]
async fn listeners_see_transitions_in_order() {
    let listener = Arc::new(RecordingListener::default());
    let radio = Arc::new(SimulatedRadio::new(INTERFACE));
    let coordinator = SessionCoordinator::builder()
        .with_radio(radio)
        .with_listener(listener.clone())
        .build()
        .unwrap();
    let mut events = coordinator.subscribe_events();

    coordinator.request_enable(&guest_network()).unwrap();
    coordinator.request_disable().unwrap();

    let mut broadcast = Vec::new();
    for _ in 0..4 {
        broadcast.push(events.recv().await.unwrap().new_state);
    }
    assert_eq!(
        broadcast,
        vec![
            SessionState::Enabling,
            SessionState::Started,
            SessionState::Disabling,
            SessionState::Idle,
        ]
    );
    assert_eq!(*listener.seen.lock(), broadcast);
}

#[tokio::test]
async fn event_stream_yields_changes() {
    use tokio_stream::StreamExt;

    let h = Harness::new();
    let mut stream = h.coordinator.event_stream();
    h.coordinator.request_enable(&guest_network()).unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.new_state, SessionState::Enabling);
}

#[tokio::test]
async fn shutdown_stops_the_session_and_the_worker() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;

    h.coordinator.shutdown().await.unwrap();
    assert_eq!(
        h.next_states(2).await,
        vec![SessionState::Disabling, SessionState::Idle]
    );
    assert!(!h.radio.is_running());

    let err = h.coordinator.request_enable(&guest_network()).unwrap_err();
    assert!(matches!(err, SessionError::WorkerStopped));
    assert!(h.coordinator.connected_devices().await.is_err());
    assert!(h.coordinator.shutdown().await.is_err());
}

#[tokio::test]
async fn stats_count_enable_requests_and_teardowns() {
    let mut h = Harness::new();
    h.start(&guest_network()).await;
    h.coordinator.request_disable().unwrap();
    h.next_states(2).await;

    let stats = h.coordinator.stats();
    assert_eq!(stats.enable_requests, 1);
    assert_eq!(stats.starts_succeeded, 1);
    assert_eq!(stats.teardowns, 1);
}
