use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    entity::{Entity, EntityId},
    error::StorageError,
    serializer::{RawEntity, ID_FIELD},
};

/// Field holding the primary key of every stored document
pub const KEY_FIELD: &str = "_id";

/// Store-side identity of a document.
///
/// Keys derived from entities are the raw entity id string; documents inserted without a key get
/// one assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(String);

impl PrimaryKey {
    pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

    /// A fresh store-assigned key
    pub fn generate() -> Self { Self(ulid::Ulid::new().to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn as_bytes(&self) -> &[u8] { self.0.as_bytes() }
}

impl From<&EntityId> for PrimaryKey {
    fn from(id: &EntityId) -> Self { Self(id.as_str().to_owned()) }
}

impl std::fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// A flat store record: `_id` plus scalar fields and raw relationship ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self { Self(Map::new()) }

    /// The primary key, if present. A non-string `_id` is an error.
    pub fn key(&self) -> Result<Option<PrimaryKey>, StorageError> {
        match self.0.get(KEY_FIELD) {
            None => Ok(None),
            Some(Value::String(key)) => Ok(Some(PrimaryKey::new(key.clone()))),
            Some(other) => Err(StorageError::InvalidKey(other.to_string())),
        }
    }

    pub fn set_key(&mut self, key: &PrimaryKey) { self.0.insert(KEY_FIELD.to_owned(), Value::String(key.as_str().to_owned())); }

    pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> { self.0.insert(field.into(), value) }

    pub fn fields(&self) -> &Map<String, Value> { &self.0 }

    pub fn into_fields(self) -> Map<String, Value> { self.0 }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> { Ok(serde_json::to_vec(&self.0)?) }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> { Ok(Self(serde_json::from_slice(bytes)?)) }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self { Self(fields) }
}

impl TryFrom<Value> for Document {
    type Error = StorageError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StorageError::SerializationError(format!("expected an object, got {other}").into())),
        }
    }
}

/// Pure translation between raw entity shapes and documents. Never fails; malformed shapes are
/// caught later by the entity serializer.
pub struct DocumentMapper;

impl DocumentMapper {
    /// Move the snapshot's `id` to `_id`.
    pub fn to_document(mut snapshot: RawEntity) -> Document {
        if let Some(id) = snapshot.remove(ID_FIELD) {
            snapshot.insert(KEY_FIELD.to_owned(), id);
        }
        Document(snapshot)
    }

    /// The key is derived from the id alone, no snapshot required.
    pub fn primary_key_of<D>(entity: &Entity<D>) -> PrimaryKey { PrimaryKey::from(entity.id()) }

    /// Inverse of [`to_document`](Self::to_document): move `_id` back to `id`.
    pub fn document_to_snapshot(document: Document) -> RawEntity {
        let mut fields = document.0;
        if let Some(key) = fields.remove(KEY_FIELD) {
            fields.insert(ID_FIELD.to_owned(), key);
        }
        fields
    }
}
