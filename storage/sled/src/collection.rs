use async_trait::async_trait;
use futures::StreamExt;
use graphmirror_core::{
    error::StorageError,
    storage::{DocumentCollection, DocumentStream},
    Document, PrimaryKey,
};
use tokio::task;
use tracing::debug;

use crate::error::{sled_error, SledStoreError};

#[derive(Clone)]
pub struct SledCollection {
    pub name: String,
    pub tree: sled::Tree,
}

impl SledCollection {
    pub fn new(name: String, tree: sled::Tree) -> Self { Self { name, tree } }
}

#[async_trait]
impl DocumentCollection for SledCollection {
    fn name(&self) -> &str { &self.name }

    // sled operations are not async, so they run on the blocking pool
    async fn insert_one(&self, document: Document) -> Result<PrimaryKey, StorageError> {
        let me = self.clone();
        task::spawn_blocking(move || me.insert_one_blocking(document)).await?
    }

    async fn replace_one(&self, key: &PrimaryKey, document: Document) -> Result<bool, StorageError> {
        let me = self.clone();
        let key = key.clone();
        task::spawn_blocking(move || me.replace_one_blocking(&key, document)).await?
    }

    async fn delete_one(&self, key: &PrimaryKey) -> Result<bool, StorageError> {
        let tree = self.tree.clone();
        let key = key.clone();
        let removed = task::spawn_blocking(move || tree.remove(key.as_bytes())).await?.map_err(sled_error)?;
        Ok(removed.is_some())
    }

    async fn find_one(&self, key: &PrimaryKey) -> Result<Option<Document>, StorageError> {
        let tree = self.tree.clone();
        let lookup = key.clone();
        match task::spawn_blocking(move || tree.get(lookup.as_bytes())).await?.map_err(sled_error)? {
            Some(bytes) => Ok(Some(decode(&bytes, key.as_str())?)),
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<usize, StorageError> {
        let tree = self.tree.clone();
        Ok(task::spawn_blocking(move || tree.len()).await?)
    }

    async fn delete_many(&self) -> Result<usize, StorageError> {
        let tree = self.tree.clone();
        task::spawn_blocking(move || -> Result<usize, StorageError> {
            let removed = tree.len();
            tree.clear().map_err(sled_error)?;
            Ok(removed)
        })
        .await?
    }

    fn find_all(&self) -> DocumentStream {
        let me = self.clone();
        futures::stream::once(async move {
            match task::spawn_blocking(move || me.scan_blocking()).await {
                Ok(documents) => documents,
                Err(err) => vec![Err(err.into())],
            }
        })
        .flat_map(futures::stream::iter)
        .boxed()
    }
}

impl SledCollection {
    fn insert_one_blocking(&self, mut document: Document) -> Result<PrimaryKey, StorageError> {
        let key = match document.key()? {
            Some(key) => key,
            None => {
                let key = PrimaryKey::generate();
                document.set_key(&key);
                key
            }
        };
        let bytes = document.to_bytes()?;
        // Only succeeds when nothing is stored under the key yet
        match self.tree.compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes)).map_err(sled_error)? {
            Ok(()) => {
                debug!("{}.insert_one {}", self.name, key);
                Ok(key)
            }
            Err(_) => Err(StorageError::DuplicateKey(key)),
        }
    }

    fn replace_one_blocking(&self, key: &PrimaryKey, mut document: Document) -> Result<bool, StorageError> {
        document.set_key(key);
        let bytes = document.to_bytes()?;
        let previous = self.tree.fetch_and_update(key.as_bytes(), |old| old.map(|_| bytes.clone())).map_err(sled_error)?;
        Ok(previous.is_some())
    }

    fn scan_blocking(&self) -> Vec<Result<Document, StorageError>> {
        self.tree
            .iter()
            .map(|entry| {
                let (key, value) = entry.map_err(sled_error)?;
                decode(&value, &String::from_utf8_lossy(&key))
            })
            .collect()
    }
}

fn decode(bytes: &[u8], key: &str) -> Result<Document, StorageError> {
    serde_json::from_slice(bytes).map_err(|source| SledStoreError::CorruptDocument { key: key.to_owned(), source }.into())
}
