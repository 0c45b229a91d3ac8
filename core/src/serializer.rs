use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{
    entity::EntityId,
    error::{DeserializationError, SerializationError},
};

/// The raw, flat shape of an entity: an `id` field plus its scalar and relationship fields.
pub type RawEntity = Map<String, Value>;

/// Field carrying the entity id in a [`RawEntity`]
pub const ID_FIELD: &str = "id";

/// Translates entities of one type to and from their raw shape.
///
/// `deserialize` is the validation point: anything the store hands back is only trusted after it
/// passes through here.
pub trait EntitySerializer<D>: Send + Sync {
    fn serialize(&self, id: &EntityId, data: &D) -> Result<RawEntity, SerializationError>;
    fn deserialize(&self, raw: RawEntity) -> Result<(EntityId, D), DeserializationError>;
}

/// A serializer expressed through a typed `serde` record.
///
/// The record carries relationships as raw ids; `from_record` rebuilds the pointers against
/// whatever repositories the codec was constructed with.
pub trait RecordCodec<D>: Send + Sync {
    type Record: Serialize + DeserializeOwned;

    fn to_record(&self, id: &EntityId, data: &D) -> Self::Record;
    fn from_record(&self, record: Self::Record) -> Result<(EntityId, D), DeserializationError>;
}

impl<D, C: RecordCodec<D>> EntitySerializer<D> for C {
    fn serialize(&self, id: &EntityId, data: &D) -> Result<RawEntity, SerializationError> {
        match serde_json::to_value(self.to_record(id, data))? {
            Value::Object(raw) => Ok(raw),
            _ => Err(SerializationError::NotAnObject(id.clone())),
        }
    }

    fn deserialize(&self, raw: RawEntity) -> Result<(EntityId, D), DeserializationError> {
        if !raw.contains_key(ID_FIELD) {
            return Err(DeserializationError::MissingField(ID_FIELD));
        }
        let record: C::Record = serde_json::from_value(Value::Object(raw))?;
        self.from_record(record)
    }
}
