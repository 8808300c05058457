//! Document persistence for the gateway's workers.
//!
//! Documents are flat JSON objects grouped into collections and keyed by
//! their `_id`. Uniqueness of `(collection, _id)` is enforced by the store,
//! which is how concurrent CREATEs of the same id are resolved.

pub mod error;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use docgate_common::Document;

pub use error::StoreError;
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// Create/read access to a document collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document keyed by its `_id` field. Returns the id.
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Fetch a document by id. `Ok(None)` when no such document exists.
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        (**self).insert(collection, document).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        (**self).find_by_id(collection, id).await
    }
}

/// Read the `_id` of a document about to be inserted.
pub(crate) fn document_id(document: &Document) -> Result<String, StoreError> {
    document
        .get(docgate_common::DOCUMENT_ID_FIELD)
        .and_then(|v| v.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(StoreError::MissingId)
}
