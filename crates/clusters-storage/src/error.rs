//! Storage layer error types.

use clusters_types::{ErrorCode, TopicKey};
use thiserror::Error;

/// Errors that can occur in the raw storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors returned by [`crate::TopicStore`] operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(TopicKey),

    #[error("Topic already exists: {0}")]
    AlreadyExists(TopicKey),

    #[error("Topic already finished: {0}")]
    AlreadyFinished(TopicKey),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(StorageError::from(err))
    }
}

impl StoreError {
    /// Stable error code for callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::SessionNotFound(_) | StoreError::TopicNotFound(_) => ErrorCode::NotFound,
            StoreError::AlreadyExists(_) | StoreError::AlreadyFinished(_) => ErrorCode::Conflict,
            StoreError::InvalidInput(_) => ErrorCode::InvalidInput,
            StoreError::Storage(_) => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_codes() {
        let key = TopicKey::new("s1", "t1");
        assert_eq!(
            StoreError::SessionNotFound("s1".into()).code(),
            ErrorCode::NotFound
        );
        assert_eq!(StoreError::TopicNotFound(key.clone()).code(), ErrorCode::NotFound);
        assert_eq!(StoreError::AlreadyExists(key.clone()).code(), ErrorCode::Conflict);
        assert_eq!(StoreError::AlreadyFinished(key).code(), ErrorCode::Conflict);
        assert_eq!(
            StoreError::Storage(StorageError::ColumnFamilyNotFound("x".into())).code(),
            ErrorCode::Internal
        );
    }

    #[test]
    fn test_display_includes_key() {
        let err = StoreError::TopicNotFound(TopicKey::new("s1", "t1"));
        assert_eq!(err.to_string(), "Topic not found: s1/t1");
    }
}
