use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use graphmirror_core::{
    error::StorageError,
    storage::{DocumentCollection, DocumentStore},
};

use crate::collection::MemoryCollection;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn list_collections(&self) -> Vec<String> { self.collections.iter().map(|entry| entry.key().clone()).collect() }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn collection(&self, name: &str) -> Result<Arc<dyn DocumentCollection>, StorageError> {
        let collection = self.collections.entry(name.to_owned()).or_insert_with(|| Arc::new(MemoryCollection::new(name))).clone();
        Ok(collection)
    }

    async fn delete_all_collections(&self) -> Result<bool, StorageError> {
        let any_deleted = !self.collections.is_empty();
        self.collections.clear();
        Ok(any_deleted)
    }
}
