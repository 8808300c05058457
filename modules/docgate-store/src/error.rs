use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with this id already exists in the collection
    #[error("duplicate key: {collection}/{id}")]
    DuplicateKey { collection: String, id: String },

    /// Document handed to `insert` carries no usable `_id`
    #[error("document has no _id")]
    MissingId,

    /// Stored body is not a JSON object
    #[error("corrupt document: {collection}/{id}")]
    Corrupt { collection: String, id: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
