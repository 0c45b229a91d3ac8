use graphmirror_core::error::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SledStoreError {
    #[error("Storage error: {0}")]
    StorageError(#[from] sled::Error),
    #[error("Corrupt document under key {key}: {source}")]
    CorruptDocument {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<SledStoreError> for StorageError {
    fn from(err: SledStoreError) -> Self { StorageError::backend(err) }
}

pub fn sled_error(err: sled::Error) -> StorageError { SledStoreError::StorageError(err).into() }
