use thiserror::Error;

/// Failure reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("collection {0} already exists")]
    CollectionExists(String),
    #[error("collection {0} not found")]
    CollectionNotFound(String),
    #[error("document {collection}/{id} already exists")]
    DocumentExists { collection: String, id: String },
    #[error("document {collection}/{id} not found")]
    DocumentNotFound { collection: String, id: String },
    #[error("revision conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: String,
        actual: String,
    },
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("store connection closed")]
    Closed,
    #[error("storage is not initialized")]
    NotConnected,
}

/// The single error kind surfaced by read, write and clear.
///
/// Conflicts, transport failures and decode failures all arrive as this one
/// type; only `message` tells them apart.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed ({code}): {message}")]
pub struct StorageError {
    pub code: u32,
    pub operation: &'static str,
    pub message: String,
}

/// Startup rejection of [`ArangoStorageOptions`](crate::options::ArangoStorageOptions).
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration for arango storage {name} is invalid: {field} is not valid")]
    Blank { name: String, field: &'static str },
    #[error("configuration for arango storage {name} is invalid: url: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

// Implementations

impl StorageError {
    pub(crate) fn new(code: u32, operation: &'static str, cause: impl ToString) -> Self {
        Self {
            code,
            operation,
            message: cause.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
