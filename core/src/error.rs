//! Error types for graphmirror.
//!
//! Storage backends map their native errors into [`StorageError`]; everything the queue and the
//! filler can surface is built on top of it.

use thiserror::Error;

use crate::{document::PrimaryKey, entity::EntityId};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duplicate key: {0}")]
    DuplicateKey(PrimaryKey),

    #[error("invalid primary key: {0}")]
    InvalidKey(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("serialization error: {0}")]
    SerializationError(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("backend error: {0}")]
    BackendError(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StorageError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self { StorageError::BackendError(Box::new(err)) }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self { StorageError::SerializationError(Box::new(err)) }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self { StorageError::BackendError(Box::new(err)) }
}

/// Failure to turn an entity into its raw shape.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("entity {0} did not serialize to an object")]
    NotAnObject(EntityId),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failure to validate a raw shape as an entity.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid shape: {0}")]
    InvalidShape(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("entity already exists: {0}")]
    DuplicateId(EntityId),

    #[error("entity not found: {0}")]
    NotFound(EntityId),
}

/// Error type for [`RepositoryFiller::fill_repository`](crate::filler::RepositoryFiller::fill_repository).
#[derive(Debug, Error)]
pub enum FillError {
    #[error("repository already holds {0} entities")]
    RepositoryNotEmpty(usize),

    #[error("document {key:?} failed to deserialize: {source}")]
    Deserialization {
        key: Option<PrimaryKey>,
        #[source]
        source: DeserializationError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("a task queue must be created from within a tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("invalid failure policy: {0}")]
    InvalidPolicy(String),
}

/// Why a queued persistence task did not complete.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("task panicked: {0}")]
    Panicked(String),
}
