use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    document::{Document, PrimaryKey},
    error::StorageError,
};

/// Cursor over every document of a collection, each visited exactly once.
pub type DocumentStream = BoxStream<'static, Result<Document, StorageError>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // Opens and/or creates a collection.
    async fn collection(&self, name: &str) -> Result<Arc<dyn DocumentCollection>, StorageError>;
    // Delete all collections and their documents
    async fn delete_all_collections(&self) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert a new document. A missing `_id` gets a store-assigned key; an existing key is an error.
    async fn insert_one(&self, document: Document) -> Result<PrimaryKey, StorageError>;

    /// Replace the whole document stored under `key`. Returns false when nothing matched.
    async fn replace_one(&self, key: &PrimaryKey, document: Document) -> Result<bool, StorageError>;

    /// Returns false when nothing matched
    async fn delete_one(&self, key: &PrimaryKey) -> Result<bool, StorageError>;

    async fn find_one(&self, key: &PrimaryKey) -> Result<Option<Document>, StorageError>;

    async fn count(&self) -> Result<usize, StorageError>;

    /// Remove every document, returning how many were removed
    async fn delete_many(&self) -> Result<usize, StorageError>;

    /// Stream every document in the store's natural order
    fn find_all(&self) -> DocumentStream;
}

/// A collection handle shared between the persistence layers and fillers that target it.
#[derive(Clone)]
pub struct CollectionHandle(Arc<dyn DocumentCollection>);

impl CollectionHandle {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self { Self(collection) }
}

impl From<Arc<dyn DocumentCollection>> for CollectionHandle {
    fn from(collection: Arc<dyn DocumentCollection>) -> Self { Self(collection) }
}

impl std::ops::Deref for CollectionHandle {
    type Target = Arc<dyn DocumentCollection>;
    fn deref(&self) -> &Self::Target { &self.0 }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "CollectionHandle({})", self.0.name()) }
}
