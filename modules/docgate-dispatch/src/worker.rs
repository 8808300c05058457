use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use docgate_common::{
    Document, FamilySchema, Operation, OperationMessage, ResourceId, WorkerResult,
};
use docgate_store::DocumentStore;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::bus::Envelope;

const NOT_FOUND: &str = "document not found";
const WORKER_FAULT: &str = "worker fault";

/// Executes CREATE/READ operations for one resource family.
///
/// The family-specific behaviour (collection, server-populated fields) comes
/// from the injected `FamilySchema`; the worker itself is family-agnostic.
pub struct PersistenceWorker {
    index: usize,
    schema: FamilySchema,
    store: Arc<dyn DocumentStore>,
}

impl PersistenceWorker {
    pub fn new(index: usize, schema: FamilySchema, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            index,
            schema,
            store,
        }
    }

    /// Serve envelopes from `inbox` one at a time until every sender is gone.
    pub async fn run(self, mut inbox: mpsc::Receiver<Envelope>) {
        debug!(family = %self.schema.family, worker = self.index, "Worker started");

        while let Some(Envelope { message, reply }) = inbox.recv().await {
            if reply.is_closed() {
                debug!(
                    family = %self.schema.family,
                    worker = self.index,
                    resource_id = %message.resource_id,
                    "Caller gave up before execution, skipping"
                );
                continue;
            }

            let resource_id = message.resource_id.clone();
            let result = match AssertUnwindSafe(self.handle(message)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    error!(
                        family = %self.schema.family,
                        worker = self.index,
                        resource_id = %resource_id,
                        "Operation panicked"
                    );
                    WorkerResult::error(resource_id, WORKER_FAULT)
                }
            };

            if reply.send(result).is_err() {
                debug!(
                    family = %self.schema.family,
                    worker = self.index,
                    "Caller gone, result discarded"
                );
            }
        }

        debug!(family = %self.schema.family, worker = self.index, "Worker stopped");
    }

    /// Execute a single operation. Store faults become ERROR results.
    pub async fn handle(&self, message: OperationMessage) -> WorkerResult {
        let OperationMessage {
            resource_id,
            operation,
        } = message;

        match operation {
            Operation::Create { payload, caller_id } => {
                self.create(resource_id, &payload, &caller_id).await
            }
            Operation::Read => self.read(resource_id).await,
        }
    }

    async fn create(&self, resource_id: ResourceId, payload: &Document, caller_id: &str) -> WorkerResult {
        let document = self.schema.build_document(&resource_id, payload, caller_id);

        match self.store.insert(self.schema.collection, document.clone()).await {
            Ok(_) => WorkerResult::ok(resource_id, document),
            Err(e) => {
                warn!(
                    error = %e,
                    collection = self.schema.collection,
                    resource_id = %resource_id,
                    "Insert failed"
                );
                WorkerResult::error(resource_id, e.to_string())
            }
        }
    }

    async fn read(&self, resource_id: ResourceId) -> WorkerResult {
        match self
            .store
            .find_by_id(self.schema.collection, resource_id.as_str())
            .await
        {
            Ok(Some(document)) => WorkerResult::ok(resource_id, document),
            Ok(None) => WorkerResult::error(resource_id, NOT_FOUND),
            Err(e) => {
                warn!(
                    error = %e,
                    collection = self.schema.collection,
                    resource_id = %resource_id,
                    "Read failed"
                );
                WorkerResult::error(resource_id, e.to_string())
            }
        }
    }
}
