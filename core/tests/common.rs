use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use futures::StreamExt;
use graphmirror_core::{
    error::{DeserializationError, StorageError},
    storage::{DocumentCollection, DocumentStream},
    Document, EntityId, PrimaryKey, RecordCodec,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    // if LOG_LEVEL env var is set, use it
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init();
    }
}

/// A plain vector-backed collection that logs every write and can hold writes behind a gate.
pub struct LogCollection {
    name: String,
    documents: Mutex<Vec<Document>>,
    log: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[allow(unused)]
impl LogCollection {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_owned(),
            documents: Mutex::new(Vec::new()),
            log,
            gate: None,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Every write waits for one permit of `gate`
    pub fn gated(name: &str, log: Arc<Mutex<Vec<String>>>, gate: Arc<Semaphore>) -> Self { Self { gate: Some(gate), ..Self::new(name, log) } }

    pub fn documents(&self) -> Vec<Document> { self.documents.lock().unwrap().clone() }

    pub fn max_active(&self) -> usize { self.max_active.load(Ordering::SeqCst) }

    async fn write<R>(&self, entry: String, f: impl FnOnce(&mut Vec<Document>) -> Result<R, StorageError>) -> Result<R, StorageError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let result = f(&mut self.documents.lock().unwrap());
        if result.is_ok() {
            self.log.lock().unwrap().push(entry);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn position(documents: &[Document], key: &PrimaryKey) -> Option<usize> {
    documents.iter().position(|d| d.key().ok().flatten().as_ref() == Some(key))
}

#[async_trait]
impl DocumentCollection for LogCollection {
    fn name(&self) -> &str { &self.name }

    async fn insert_one(&self, mut document: Document) -> Result<PrimaryKey, StorageError> {
        let key = document.key()?.unwrap_or_else(PrimaryKey::generate);
        document.set_key(&key);
        if key.as_str().starts_with("fail") {
            return Err(StorageError::backend(std::io::Error::other("refused")));
        }
        let entry = format!("{} insert {}", self.name, key);
        self.write(entry, move |documents| {
            if position(documents, &key).is_some() {
                return Err(StorageError::DuplicateKey(key));
            }
            documents.push(document);
            Ok(key)
        })
        .await
    }

    async fn replace_one(&self, key: &PrimaryKey, mut document: Document) -> Result<bool, StorageError> {
        document.set_key(key);
        self.write(format!("{} replace {}", self.name, key), |documents| match position(documents, key) {
            Some(i) => {
                documents[i] = document;
                Ok(true)
            }
            None => Ok(false),
        })
        .await
    }

    async fn delete_one(&self, key: &PrimaryKey) -> Result<bool, StorageError> {
        self.write(format!("{} delete {}", self.name, key), |documents| match position(documents, key) {
            Some(i) => {
                documents.remove(i);
                Ok(true)
            }
            None => Ok(false),
        })
        .await
    }

    async fn find_one(&self, key: &PrimaryKey) -> Result<Option<Document>, StorageError> {
        let documents = self.documents.lock().unwrap();
        Ok(position(&documents, key).map(|i| documents[i].clone()))
    }

    async fn count(&self) -> Result<usize, StorageError> { Ok(self.documents.lock().unwrap().len()) }

    async fn delete_many(&self) -> Result<usize, StorageError> { Ok(self.documents.lock().unwrap().drain(..).count()) }

    fn find_all(&self) -> DocumentStream { futures::stream::iter(self.documents().into_iter().map(Ok)).boxed() }
}

pub struct Tag {
    pub label: String,
}

#[derive(Serialize, Deserialize)]
pub struct TagRecord {
    pub id: EntityId,
    pub label: String,
}

pub struct TagCodec;

impl RecordCodec<Tag> for TagCodec {
    type Record = TagRecord;
    fn to_record(&self, id: &EntityId, tag: &Tag) -> TagRecord { TagRecord { id: id.clone(), label: tag.label.clone() } }
    fn from_record(&self, record: TagRecord) -> Result<(EntityId, Tag), DeserializationError> { Ok((record.id, Tag { label: record.label })) }
}

#[allow(unused)]
pub fn tag(label: &str) -> Tag { Tag { label: label.to_owned() } }

#[allow(unused)]
pub fn log() -> Arc<Mutex<Vec<String>>> { Arc::new(Mutex::new(Vec::new())) }
