//! Associated-device bookkeeping
//!
//! A device goes through two maps: `l2_connected` as soon as it associates,
//! and `resolved` once its name is known (or resolution gave up). Only
//! devices present in both are reported as connected.
//!
//! Name resolution first tries the lease registry inline. On a miss a poll
//! task retries at a fixed interval up to a fixed number of attempts, then
//! delivers its single result back through the radio queue. Poll tasks
//! never touch tracker state themselves; there is at most one per MAC
//! address and it is aborted on disconnect, reconnect and [`clear`].
//!
//! [`clear`]: ClientPresenceTracker::clear

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::adapters::{AssociationEvent, PresenceNotifier};
use crate::config::CoordinatorConfig;
use crate::executor::ExecutorInput;
use crate::presence::lease::LeaseRegistry;
use crate::queue::RadioQueue;
use crate::stats::SessionStats;
use crate::types::{ClientRecord, MacAddress};

/// Final result of one name-resolution poll task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResolution {
    /// Session generation the poll was started in
    pub session: u64,
    pub mac: MacAddress,
    /// Identifies the poll task, so a superseded poll cannot land
    pub poll: u64,
    /// `None` when the retry budget ran out
    pub name: Option<String>,
}

struct PendingPoll {
    id: u64,
    task: JoinHandle<()>,
}

pub struct ClientPresenceTracker {
    registry: LeaseRegistry,
    notifier: Arc<dyn PresenceNotifier>,
    queue: RadioQueue,
    stats: Arc<SessionStats>,
    poll_interval: Duration,
    max_attempts: u32,
    session: u64,
    next_poll: u64,
    l2_connected: HashMap<MacAddress, ClientRecord>,
    resolved: HashMap<MacAddress, ClientRecord>,
    pending: HashMap<MacAddress, PendingPoll>,
}

impl ClientPresenceTracker {
    pub fn new(
        config: &CoordinatorConfig,
        notifier: Arc<dyn PresenceNotifier>,
        queue: RadioQueue,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            registry: LeaseRegistry::new(config.lease_file.clone()),
            notifier,
            queue,
            stats,
            poll_interval: config.name_poll_interval(),
            max_attempts: config.name_poll_max_attempts,
            session: 0,
            next_poll: 0,
            l2_connected: HashMap::new(),
            resolved: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Start tracking for a new session generation
    pub fn activate(&mut self, session: u64) {
        self.clear();
        self.session = session;
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub async fn on_association(&mut self, event: AssociationEvent) {
        if event.connected {
            self.on_connected(event.mac).await;
        } else {
            self.on_disconnected(event.mac);
        }
    }

    async fn on_connected(&mut self, mac: MacAddress) {
        // A reconnect starts over with a fresh record
        self.cancel_poll(&mac);
        self.resolved.remove(&mac);
        let mut record = ClientRecord::connected(mac);
        debug!(mac = %mac, "client associated");

        match self.registry.lookup(&mac).await {
            Ok(Some(name)) => {
                info!(mac = %mac, name = %name, "client resolved from lease registry");
                record.resolved_name = Some(name);
                self.l2_connected.insert(mac, record.clone());
                self.resolved.insert(mac, record);
                self.notify();
            }
            Ok(None) => {
                self.l2_connected.insert(mac, record);
                self.schedule_poll(mac);
            }
            Err(e) => {
                warn!(mac = %mac, "lease lookup failed: {}", e);
                self.l2_connected.insert(mac, record);
                self.schedule_poll(mac);
            }
        }
    }

    fn on_disconnected(&mut self, mac: MacAddress) {
        self.cancel_poll(&mac);
        self.resolved.remove(&mac);
        let was_connected = self
            .l2_connected
            .remove(&mac)
            .map_or(false, |record| record.is_connected());

        debug!(mac = %mac, was_connected, "client disassociated");
        if was_connected {
            self.notify();
        }
    }

    /// Apply the result delivered by a poll task
    pub fn on_name_resolved(&mut self, resolution: NameResolution) {
        let NameResolution { session, mac, poll, name } = resolution;

        if session != self.session {
            trace!(mac = %mac, "dropping resolution from an earlier session");
            return;
        }
        match self.pending.get(&mac) {
            Some(pending) if pending.id == poll => {
                self.pending.remove(&mac);
            }
            _ => {
                trace!(mac = %mac, poll, "dropping superseded resolution");
                return;
            }
        }

        // The device may have left while the poll was running
        let Some(record) = self.l2_connected.get_mut(&mac).filter(|r| r.is_connected()) else {
            debug!(mac = %mac, "suppressing resolution for departed client");
            return;
        };

        match &name {
            Some(name) => info!(mac = %mac, name = %name, "client resolved after polling"),
            None => info!(mac = %mac, "no lease found, assuming statically addressed client"),
        }
        record.resolved_name = name;
        let record = record.clone();
        self.resolved.insert(mac, record);
        self.notify();
    }

    /// Fully resolved clients that are still L2-connected
    pub fn connected_devices(&self) -> Vec<ClientRecord> {
        let mut devices: Vec<ClientRecord> = self
            .resolved
            .values()
            .filter(|record| {
                self.l2_connected
                    .get(&record.mac)
                    .map_or(false, |current| current.is_connected())
            })
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.first_seen_at.cmp(&b.first_seen_at).then(a.mac.cmp(&b.mac)));
        devices
    }

    pub fn l2_connected_count(&self) -> usize {
        self.l2_connected.len()
    }

    pub fn pending_polls(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l2_connected.is_empty() && self.resolved.is_empty() && self.pending.is_empty()
    }

    /// Drop every record and abort every poll
    pub fn clear(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
        self.l2_connected.clear();
        self.resolved.clear();
    }

    fn notify(&self) {
        let count = self.connected_devices().len();
        self.stats.record_presence_notification();
        self.notifier.presence_changed(count);
    }

    fn cancel_poll(&mut self, mac: &MacAddress) {
        if let Some(pending) = self.pending.remove(mac) {
            trace!(mac = %mac, poll = pending.id, "cancelling name poll");
            pending.task.abort();
        }
    }

    fn schedule_poll(&mut self, mac: MacAddress) {
        self.cancel_poll(&mac);
        self.next_poll += 1;
        let poll = self.next_poll;

        let registry = self.registry.clone();
        let queue = self.queue.clone();
        let interval = self.poll_interval;
        let max_attempts = self.max_attempts;
        let session = self.session;

        let task = tokio::spawn(async move {
            let mut name = None;
            for attempt in 1..=max_attempts {
                tokio::time::sleep(interval).await;
                match registry.lookup(&mac).await {
                    Ok(Some(found)) => {
                        name = Some(found);
                        break;
                    }
                    Ok(None) => trace!(mac = %mac, attempt, "no lease yet"),
                    Err(e) => debug!(mac = %mac, attempt, "lease lookup failed: {}", e),
                }
            }

            let resolution = NameResolution { session, mac, poll, name };
            if !queue.deliver(ExecutorInput::NameResolved(resolution)) {
                trace!(mac = %mac, "radio worker gone, dropping resolution");
            }
        });

        debug!(mac = %mac, poll, "scheduled name poll");
        self.pending.insert(mac, PendingPoll { id: poll, task });
    }
}

impl Drop for ClientPresenceTracker {
    fn drop(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
    }
}

impl std::fmt::Debug for ClientPresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPresenceTracker")
            .field("session", &self.session)
            .field("l2_connected", &self.l2_connected.len())
            .field("resolved", &self.resolved.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
