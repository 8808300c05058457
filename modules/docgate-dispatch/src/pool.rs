use std::sync::Arc;

use docgate_common::FamilySchema;
use docgate_store::DocumentStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::DispatchBus;
use crate::worker::PersistenceWorker;

/// Fixed set of workers serving one bus address.
///
/// Workers run in parallel with each other and sequentially within
/// themselves. They stop once the bus (and with it every queue sender) is
/// dropped.
pub struct WorkerPool {
    address: String,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers for `schema` and register their queues at
    /// `address` on the bus. Must be called inside a Tokio runtime.
    pub fn spawn(
        bus: &mut DispatchBus,
        address: &str,
        schema: FamilySchema,
        store: Arc<dyn DocumentStore>,
        size: usize,
        queue_depth: usize,
    ) -> Self {
        let size = size.max(1);
        let queue_depth = queue_depth.max(1);

        let mut queues = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let (tx, rx) = mpsc::channel(queue_depth);
            let worker = PersistenceWorker::new(index, schema, store.clone());
            handles.push(tokio::spawn(worker.run(rx)));
            queues.push(tx);
        }
        bus.register(address, queues);

        info!(
            family = %schema.family,
            address,
            workers = size,
            queue_depth,
            "Worker pool started"
        );

        Self {
            address: address.to_string(),
            handles,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to finish. Only returns once the bus is dropped.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(address = %self.address, error = %e, "Worker task failed");
            }
        }
        info!(address = %self.address, "Worker pool stopped");
    }
}
