use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use graphmirror_core::{
    error::StorageError,
    storage::{DocumentCollection, DocumentStream},
    Document, PrimaryKey,
};
use indexmap::IndexMap;
use tracing::debug;

pub struct MemoryCollection {
    name: String,
    documents: Mutex<IndexMap<PrimaryKey, Document>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), documents: Mutex::new(IndexMap::new()) } }

    fn documents(&self) -> std::sync::MutexGuard<'_, IndexMap<PrimaryKey, Document>> {
        self.documents.lock().expect("Failed to lock the collection")
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str { &self.name }

    async fn insert_one(&self, mut document: Document) -> Result<PrimaryKey, StorageError> {
        let key = match document.key()? {
            Some(key) => key,
            None => {
                let key = PrimaryKey::generate();
                document.set_key(&key);
                key
            }
        };
        let mut documents = self.documents();
        if documents.contains_key(&key) {
            return Err(StorageError::DuplicateKey(key));
        }
        debug!("{}.insert_one {}", self.name, key);
        documents.insert(key.clone(), document);
        Ok(key)
    }

    async fn replace_one(&self, key: &PrimaryKey, mut document: Document) -> Result<bool, StorageError> {
        document.set_key(key);
        // Replacing in place keeps the document's cursor position
        match self.documents().get_mut(key) {
            Some(existing) => {
                *existing = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, key: &PrimaryKey) -> Result<bool, StorageError> { Ok(self.documents().shift_remove(key).is_some()) }

    async fn find_one(&self, key: &PrimaryKey) -> Result<Option<Document>, StorageError> { Ok(self.documents().get(key).cloned()) }

    async fn count(&self) -> Result<usize, StorageError> { Ok(self.documents().len()) }

    async fn delete_many(&self) -> Result<usize, StorageError> {
        let mut documents = self.documents();
        let removed = documents.len();
        documents.clear();
        Ok(removed)
    }

    fn find_all(&self) -> DocumentStream {
        let snapshot: Vec<Document> = self.documents().values().cloned().collect();
        futures::stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }
}
