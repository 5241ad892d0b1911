//! In-process radio simulation
//!
//! [`SimulatedRadio`] implements every radio-side collaborator against an
//! in-memory model, with fault injection and call counters. It backs the
//! `softapd` demo binary and the test suites.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapters::{
    ApDriver, AssociationEvent, AssociationSource, ChannelPolicy, DriverDeath, LinkEvent,
    LinkMonitor, LivenessMonitor, LivenessToken, PresenceNotifier, SubscriptionId,
};
use crate::errors::{Result, SessionError};
use crate::types::{ApDaemonConfig, Band, MacAddress};

/// Operation of the simulated radio that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimFault {
    LivenessRegistration,
    LinkRegistration,
    AssociationRegistration,
    RegulatoryDomain,
    ChannelAllocation,
    WriteConfig,
    /// `write_config` answers `Ok(false)`
    WriteConfigRejected,
    Start,
    Stop,
    InterfaceName,
    LinkQuery,
}

#[derive(Default)]
struct SimState {
    faults: HashSet<SimFault>,
    auto_link_up: bool,
    link_up: bool,
    running: bool,
    dual_mode: bool,
    next_id: u64,
    link_subs: HashMap<SubscriptionId, (String, mpsc::UnboundedSender<LinkEvent>)>,
    liveness_subs: HashMap<SubscriptionId, (LivenessToken, mpsc::UnboundedSender<DriverDeath>)>,
    association_subs: HashMap<SubscriptionId, mpsc::UnboundedSender<AssociationEvent>>,
    start_calls: usize,
    stop_calls: usize,
    write_calls: usize,
    last_config: Option<ApDaemonConfig>,
    regulatory_domain: Option<String>,
}

impl SimState {
    fn fails(&self, fault: SimFault) -> bool {
        self.faults.contains(&fault)
    }

    fn next_subscription(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }

    fn emit_link(&mut self, interface: &str, is_up: bool) {
        self.link_up = is_up;
        self.link_subs.retain(|_, (watched, sink)| {
            if watched != interface {
                return true;
            }
            sink.send(LinkEvent {
                interface: interface.to_string(),
                is_up,
            })
            .is_ok()
        });
    }
}

/// A fake radio: daemon, channel policy and every event source in one
pub struct SimulatedRadio {
    interface: String,
    state: Mutex<SimState>,
}

impl SimulatedRadio {
    /// A radio whose interface comes up as soon as the daemon starts
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            state: Mutex::new(SimState {
                auto_link_up: true,
                ..SimState::default()
            }),
        }
    }

    /// Whether `start` raises the link by itself
    pub fn with_auto_link_up(self, enabled: bool) -> Self {
        self.state.lock().auto_link_up = enabled;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn inject(&self, fault: SimFault) {
        self.state.lock().faults.insert(fault);
    }

    pub fn clear_fault(&self, fault: SimFault) {
        self.state.lock().faults.remove(&fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Raise or drop the interface link and notify link subscribers
    pub fn set_link(&self, up: bool) {
        let interface = self.interface.clone();
        self.state.lock().emit_link(&interface, up);
    }

    /// Report every liveness registration as dead
    pub fn kill_driver(&self) {
        let mut state = self.state.lock();
        state.running = false;
        for (token, sink) in state.liveness_subs.values() {
            let _ = sink.send(DriverDeath { token: *token });
        }
    }

    pub fn associate(&self, mac: MacAddress) {
        self.emit_association(mac, true);
    }

    pub fn disassociate(&self, mac: MacAddress) {
        self.emit_association(mac, false);
    }

    fn emit_association(&self, mac: MacAddress, connected: bool) {
        let mut state = self.state.lock();
        state
            .association_subs
            .retain(|_, sink| sink.send(AssociationEvent { mac, connected }).is_ok());
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn is_link_up(&self) -> bool {
        self.state.lock().link_up
    }

    /// Mode requested by the last `start`
    pub fn last_dual_mode(&self) -> bool {
        self.state.lock().dual_mode
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().stop_calls
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    pub fn last_config(&self) -> Option<ApDaemonConfig> {
        self.state.lock().last_config.clone()
    }

    pub fn regulatory_domain(&self) -> Option<String> {
        self.state.lock().regulatory_domain.clone()
    }

    /// Registrations currently held across all event sources
    pub fn active_subscriptions(&self) -> usize {
        let state = self.state.lock();
        state.link_subs.len() + state.liveness_subs.len() + state.association_subs.len()
    }
}

impl std::fmt::Debug for SimulatedRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedRadio")
            .field("interface", &self.interface)
            .field("running", &state.running)
            .field("link_up", &state.link_up)
            .field("faults", &state.faults)
            .finish()
    }
}

fn injected(operation: &str) -> SessionError {
    SessionError::collaborator(operation, "injected fault")
}

#[async_trait]
impl ApDriver for SimulatedRadio {
    async fn write_config(&self, config: &ApDaemonConfig) -> Result<bool> {
        let mut state = self.state.lock();
        state.write_calls += 1;
        if state.fails(SimFault::WriteConfig) {
            return Err(injected("write_config"));
        }
        if state.fails(SimFault::WriteConfigRejected) {
            return Ok(false);
        }
        state.last_config = Some(config.clone());
        Ok(true)
    }

    async fn start(&self, dual_mode: bool) -> Result<bool> {
        let mut state = self.state.lock();
        state.start_calls += 1;
        if state.fails(SimFault::Start) {
            return Err(injected("start"));
        }
        state.running = true;
        state.dual_mode = dual_mode;
        if state.auto_link_up {
            state.emit_link(&self.interface, true);
        }
        debug!(interface = %self.interface, dual_mode, "simulated daemon started");
        Ok(true)
    }

    async fn stop(&self, _dual_mode: bool) -> Result<bool> {
        let mut state = self.state.lock();
        state.stop_calls += 1;
        if state.fails(SimFault::Stop) {
            return Err(injected("stop"));
        }
        state.running = false;
        if state.link_up {
            state.emit_link(&self.interface, false);
        }
        debug!(interface = %self.interface, "simulated daemon stopped");
        Ok(true)
    }

    async fn interface_name(&self) -> Result<String> {
        if self.state.lock().fails(SimFault::InterfaceName) {
            return Err(injected("interface_name"));
        }
        Ok(self.interface.clone())
    }
}

#[async_trait]
impl ChannelPolicy for SimulatedRadio {
    async fn set_regulatory_domain(&self, country_code: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if state.fails(SimFault::RegulatoryDomain) {
            return Ok(false);
        }
        state.regulatory_domain = Some(country_code.to_string());
        Ok(true)
    }

    async fn allocate_channel(&self, band: Band, allowed: &[u16]) -> Result<u16> {
        if self.state.lock().fails(SimFault::ChannelAllocation) {
            return Err(SessionError::ChannelAllocation { band });
        }
        allowed
            .iter()
            .copied()
            .find(|channel| band == Band::Any || band.accepts_channel(*channel))
            .ok_or(SessionError::ChannelAllocation { band })
    }
}

#[async_trait]
impl LinkMonitor for SimulatedRadio {
    async fn subscribe(
        &self,
        interface: &str,
        sink: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<SubscriptionId> {
        let mut state = self.state.lock();
        if state.fails(SimFault::LinkRegistration) {
            return Err(injected("link subscribe"));
        }
        let id = state.next_subscription();
        state.link_subs.insert(id, (interface.to_string(), sink));
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.state.lock().link_subs.remove(&id);
        Ok(())
    }

    async fn query_link_state(&self, interface: &str) -> Result<bool> {
        let state = self.state.lock();
        if state.fails(SimFault::LinkQuery) {
            return Err(injected("query_link_state"));
        }
        Ok(interface == self.interface && state.link_up)
    }
}

#[async_trait]
impl LivenessMonitor for SimulatedRadio {
    async fn subscribe(
        &self,
        token: LivenessToken,
        sink: mpsc::UnboundedSender<DriverDeath>,
    ) -> Result<SubscriptionId> {
        let mut state = self.state.lock();
        if state.fails(SimFault::LivenessRegistration) {
            return Err(injected("liveness subscribe"));
        }
        let id = state.next_subscription();
        state.liveness_subs.insert(id, (token, sink));
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.state.lock().liveness_subs.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AssociationSource for SimulatedRadio {
    async fn subscribe(&self, sink: mpsc::UnboundedSender<AssociationEvent>) -> Result<SubscriptionId> {
        let mut state = self.state.lock();
        if state.fails(SimFault::AssociationRegistration) {
            return Err(injected("association subscribe"));
        }
        let id = state.next_subscription();
        state.association_subs.insert(id, sink);
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.state.lock().association_subs.remove(&id);
        Ok(())
    }
}

/// Presence notifier that remembers every count it was given
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    counts: Mutex<Vec<usize>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.counts.lock().len()
    }

    pub fn last_count(&self) -> Option<usize> {
        self.counts.lock().last().copied()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.counts.lock().clone()
    }
}

impl PresenceNotifier for RecordingNotifier {
    fn presence_changed(&self, connected_devices: usize) {
        self.counts.lock().push(connected_devices);
    }
}

/// Shorthand for a radio plus the notifier wired to it
pub fn simulated(interface: &str) -> (Arc<SimulatedRadio>, Arc<RecordingNotifier>) {
    (
        Arc::new(SimulatedRadio::new(interface)),
        Arc::new(RecordingNotifier::new()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_raises_link_for_subscribers() {
        let radio = SimulatedRadio::new("wlan0");
        let (tx, mut rx) = mpsc::unbounded_channel();
        LinkMonitor::subscribe(&radio, "wlan0", tx).await.unwrap();

        assert!(radio.start(false).await.unwrap());
        let event = rx.recv().await.unwrap();
        assert_eq!(event, LinkEvent { interface: "wlan0".into(), is_up: true });
        assert!(radio.query_link_state("wlan0").await.unwrap());
    }

    #[tokio::test]
    async fn manual_link_stays_down_until_raised() {
        let radio = SimulatedRadio::new("wlan0").with_auto_link_up(false);
        radio.start(false).await.unwrap();
        assert!(!radio.query_link_state("wlan0").await.unwrap());
        radio.set_link(true);
        assert!(radio.is_link_up());
    }

    #[tokio::test]
    async fn allocation_respects_band() {
        let radio = SimulatedRadio::new("wlan0");
        let channel = radio.allocate_channel(Band::FiveGhz, &[1, 6, 36]).await.unwrap();
        assert_eq!(channel, 36);
        assert!(radio.allocate_channel(Band::FiveGhz, &[1, 6]).await.is_err());
    }

    #[tokio::test]
    async fn faults_fail_the_operation() {
        let radio = SimulatedRadio::new("wlan0");
        radio.inject(SimFault::Start);
        assert!(radio.start(false).await.is_err());
        radio.clear_faults();
        assert!(radio.start(false).await.unwrap());
        assert_eq!(radio.start_calls(), 2);
    }

    #[tokio::test]
    async fn kill_driver_notifies_token() {
        let radio = SimulatedRadio::new("wlan0");
        let (tx, mut rx) = mpsc::unbounded_channel();
        LivenessMonitor::subscribe(&radio, LivenessToken(7), tx).await.unwrap();
        radio.kill_driver();
        assert_eq!(rx.recv().await.unwrap().token, LivenessToken(7));
    }
}
