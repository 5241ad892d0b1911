//! Status event system
//!
//! Every public state transition produces one [`StatusChange`]. It is handed
//! to registered [`StatusListener`]s in order and then published on a
//! `tokio::sync::broadcast` channel, so all observers see transitions in the
//! exact order they happened.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{ApMode, FailureReason, SessionState};

/// One public state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub new_state: SessionState,
    pub previous_state: SessionState,
    /// `FailureReason::None` unless `new_state` is `Failed`
    pub failure_reason: FailureReason,
    pub interface_name: Option<String>,
    pub mode: ApMode,
    pub timestamp: DateTime<Utc>,
}

/// External consumer of status changes (usage accounting, system broadcast, ...)
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn on_status_changed(&self, change: &StatusChange);
}

/// Fans status changes out to listeners and broadcast subscribers
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<StatusChange>,
    listeners: Arc<Vec<Arc<dyn StatusListener>>>,
}

impl EventPublisher {
    pub fn new(capacity: usize, listeners: Vec<Arc<dyn StatusListener>>) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            listeners: Arc::new(listeners),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.tx.subscribe()
    }

    pub async fn publish(&self, change: StatusChange) {
        for listener in self.listeners.iter() {
            listener.on_status_changed(&change).await;
        }

        // No subscribers is fine
        if self.tx.send(change).is_err() {
            tracing::trace!("status change published with no subscribers");
        }
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("subscribers", &self.tx.receiver_count())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
