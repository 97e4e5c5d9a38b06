//! Adapter-level failures. All of them surface to the engine as
//! `DomainError::Internal`.

use domains::DomainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[cfg(feature = "db-sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate key {0}")]
    DuplicateKey(String),

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        DomainError::Internal(err.to_string())
    }
}
