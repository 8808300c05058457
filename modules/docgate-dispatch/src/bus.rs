//! Addressed request/response bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use docgate_common::{OperationMessage, WorkerResult};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A message in flight to a worker, with the channel its reply goes back on.
pub struct Envelope {
    pub message: OperationMessage,
    pub reply: oneshot::Sender<WorkerResult>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Nothing is registered at the address
    #[error("no handlers registered at {address}")]
    NoHandlers { address: String },

    /// No worker accepted and answered the message in time
    #[error("dispatch to {address} timed out after {timeout:?}")]
    TimedOut { address: String, timeout: Duration },

    /// Every worker queue at the address is closed
    #[error("workers at {address} have shut down")]
    WorkersGone { address: String },

    /// The worker dropped the reply channel without answering
    #[error("worker at {address} dropped the reply")]
    ReplyDropped { address: String },
}

/// Worker queues registered at one address, used round-robin.
struct Mailbox {
    queues: Vec<mpsc::Sender<Envelope>>,
    next: AtomicUsize,
}

impl Mailbox {
    /// Hand the envelope to one queue. Prefers the round-robin pick, moves on
    /// to the next queue with room, and waits on the pick when all are full.
    async fn deliver(&self, address: &str, mut envelope: Envelope) -> Result<(), DispatchError> {
        let count = self.queues.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed);

        for offset in 0..count {
            let queue = &self.queues[(start + offset) % count];
            match queue.try_send(envelope) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(returned)) | Err(TrySendError::Closed(returned)) => {
                    envelope = returned;
                }
            }
        }

        debug!(address, "All worker queues full, waiting for capacity");
        self.queues[start % count]
            .send(envelope)
            .await
            .map_err(|_| DispatchError::WorkersGone {
                address: address.to_string(),
            })
    }
}

/// In-process bus. Addresses are registered once at startup, then the bus is
/// shared read-only by every request.
#[derive(Default)]
pub struct DispatchBus {
    mailboxes: HashMap<String, Mailbox>,
}

impl DispatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register worker queues at `address`. Repeated registration at the same
    /// address adds to the existing set.
    pub fn register(&mut self, address: &str, queues: Vec<mpsc::Sender<Envelope>>) {
        if queues.is_empty() {
            return;
        }
        self.mailboxes
            .entry(address.to_string())
            .or_insert_with(|| Mailbox {
                queues: Vec::new(),
                next: AtomicUsize::new(0),
            })
            .queues
            .extend(queues);
    }

    /// Number of worker queues at `address`.
    pub fn handler_count(&self, address: &str) -> usize {
        self.mailboxes.get(address).map_or(0, |m| m.queues.len())
    }

    /// Send `message` to one worker at `address` and wait for its reply.
    ///
    /// `timeout` bounds both waiting for queue capacity and waiting for the
    /// reply. A message that times out before reaching a queue is never
    /// delivered; one already queued is skipped by the worker if it has not
    /// started on it yet.
    pub async fn send(
        &self,
        address: &str,
        message: OperationMessage,
        timeout: Duration,
    ) -> Result<WorkerResult, DispatchError> {
        let mailbox = self
            .mailboxes
            .get(address)
            .ok_or_else(|| DispatchError::NoHandlers {
                address: address.to_string(),
            })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: reply_tx,
        };

        let exchange = async {
            mailbox.deliver(address, envelope).await?;
            reply_rx.await.map_err(|_| DispatchError::ReplyDropped {
                address: address.to_string(),
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::TimedOut {
                address: address.to_string(),
                timeout,
            }),
        }
    }
}
