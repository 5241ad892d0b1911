//! The serialized per-radio queue
//!
//! Control requests, collaborator events and the results of name-resolution
//! polls all travel through one unbounded channel and are handled one at a
//! time by the radio worker, in arrival order.

use tokio::sync::{mpsc, oneshot};

use crate::errors::{Result, SessionError};
use crate::executor::ExecutorInput;
use crate::types::{ClientRecord, SessionConfig};

/// Requests from the public coordinator API
#[derive(Debug)]
pub enum ControlRequest {
    Enable(SessionConfig),
    Disable,
    ListClients(oneshot::Sender<Vec<ClientRecord>>),
    Shutdown(oneshot::Sender<()>),
}

/// Everything the radio worker processes
#[derive(Debug)]
pub enum RadioMessage {
    Control(ControlRequest),
    Executor(ExecutorInput),
}

/// Sending half of the radio queue
#[derive(Debug, Clone)]
pub struct RadioQueue {
    tx: mpsc::UnboundedSender<RadioMessage>,
}

impl RadioQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RadioMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send_control(&self, request: ControlRequest) -> Result<()> {
        self.tx
            .send(RadioMessage::Control(request))
            .map_err(|_| SessionError::WorkerStopped)
    }

    /// Hand an input to the executor side; `false` once the worker is gone
    pub fn deliver(&self, input: ExecutorInput) -> bool {
        self.tx.send(RadioMessage::Executor(input)).is_ok()
    }
}
