//! In-memory document store. Used when no database is configured and in tests.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use docgate_common::Document;

use crate::{document_id, DocumentStore, StoreError};

type Collections = HashMap<String, HashMap<String, Document>>;

/// Thread-safe map of collections to documents.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.lock().get(collection).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Snapshot of a single document (for assertions).
    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.lock().get(collection).and_then(|c| c.get(id)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        // Every mutation is a single insert, so a poisoned map is still consistent.
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let id = document_id(&document)?;
        let mut collections = self.lock();
        match collections.entry(collection.to_string()).or_default().entry(id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(document);
                Ok(id)
            }
        }
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.get(collection, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = MemoryDocumentStore::new();
        let id = store
            .insert("blogs", doc(json!({"_id": "b1", "title": "Hello"})))
            .await
            .unwrap();
        assert_eq!(id, "b1");

        let found = store.find_by_id("blogs", "b1").await.unwrap().unwrap();
        assert_eq!(found["title"], json!("Hello"));
        assert_eq!(store.len("blogs"), 1);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected_and_original_kept() {
        let store = MemoryDocumentStore::new();
        store
            .insert("blogs", doc(json!({"_id": "b1", "title": "first"})))
            .await
            .unwrap();
        let err = store
            .insert("blogs", doc(json!({"_id": "b1", "title": "second"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref id, .. } if id == "b1"));
        assert_eq!(store.get("blogs", "b1").unwrap()["title"], json!("first"));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryDocumentStore::new();
        store.insert("users", doc(json!({"_id": "x"}))).await.unwrap();
        assert!(store.find_by_id("blogs", "x").await.unwrap().is_none());
        assert!(store.is_empty("blogs"));
    }

    #[tokio::test]
    async fn missing_id_is_rejected() {
        let store = MemoryDocumentStore::new();
        let err = store.insert("blogs", doc(json!({"title": "t"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingId));
    }
}
