use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use graphmirror_core::{
    error::StorageError,
    storage::{DocumentCollection, DocumentStore},
};
use sled::Config;

use crate::{collection::SledCollection, error::sled_error};

const COLLECTION_PREFIX: &str = "collection_";

pub struct SledDocumentStore {
    pub db: sled::Db,
}

impl SledDocumentStore {
    pub fn with_homedir_folder(folder_name: &str) -> anyhow::Result<Self> {
        let dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))?.join(folder_name);

        Self::with_path(dir)
    }

    pub fn with_path(path: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&path)?;
        let db = sled::open(path.join("sled"))?;
        Ok(Self { db })
    }

    pub fn new() -> anyhow::Result<Self> { Self::with_homedir_folder(".graphmirror") }

    pub fn new_test() -> anyhow::Result<Self> {
        let db = Config::new().temporary(true).flush_every_ms(None).open()?;
        Ok(Self { db })
    }

    /// List all collections by looking for trees that start with collection_
    pub fn list_collections(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .filter_map(|name| {
                let name = String::from_utf8(name.to_vec()).ok()?;
                name.strip_prefix(COLLECTION_PREFIX).map(str::to_owned)
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for SledDocumentStore {
    async fn collection(&self, name: &str) -> Result<Arc<dyn DocumentCollection>, StorageError> {
        let tree = self.db.open_tree(format!("{COLLECTION_PREFIX}{name}")).map_err(sled_error)?;
        Ok(Arc::new(SledCollection::new(name.to_owned(), tree)))
    }

    async fn delete_all_collections(&self) -> Result<bool, StorageError> {
        let mut any_deleted = false;
        for name in self.db.tree_names() {
            if !name.starts_with(COLLECTION_PREFIX.as_bytes()) {
                continue;
            }
            if self.db.drop_tree(&name).map_err(sled_error)? {
                any_deleted = true;
            }
        }
        Ok(any_deleted)
    }
}
