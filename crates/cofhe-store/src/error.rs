//! Store failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    /// A JSON value under `key` could not be encoded or decoded.
    #[error("value under {key} is not valid JSON: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A writer panicked while holding the backend lock.
    #[error("store lock poisoned")]
    Poisoned,

    /// The blocking worker running a SQLite call panicked or was cancelled.
    #[error("sqlite worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("schema migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
