//! Postgres-backed document store. Bodies live in a JSONB column keyed by
//! `(collection, id)`.

use async_trait::async_trait;
use docgate_common::Document;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::{document_id, DocumentStore, StoreError};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized for the worker pool and run migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to document database");

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let id = document_id(&document)?;
        let body = Value::Object(document);

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(&body)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let body = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match body {
            None => Ok(None),
            Some(Value::Object(doc)) => Ok(Some(doc)),
            Some(_) => Err(StoreError::Corrupt {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }
}
