use std::sync::Arc;

use tracing::debug;

use crate::{
    action_error, action_warn,
    document::{Document, DocumentMapper},
    entity::Entity,
    error::SerializationError,
    event::{EntityEvent, EntityEventListener},
    queue::{Task, TaskQueue},
    serializer::EntitySerializer,
    storage::CollectionHandle,
};

/// Mirrors the lifecycle of one repository into one collection.
///
/// Documents and keys are captured synchronously while the event is being delivered; the store
/// write itself happens later on the shared [`TaskQueue`]. Every event produces its own task, so
/// successive updates of one entity are replayed individually and never coalesced.
pub struct PersistenceLayer<D> {
    collection: CollectionHandle,
    serializer: Arc<dyn EntitySerializer<D>>,
    queue: TaskQueue,
}

impl<D: 'static> PersistenceLayer<D> {
    pub fn new(collection: impl Into<CollectionHandle>, serializer: Arc<dyn EntitySerializer<D>>, queue: TaskQueue) -> Self {
        Self { collection: collection.into(), serializer, queue }
    }

    pub fn collection(&self) -> &CollectionHandle { &self.collection }

    fn entity_created(&self, entity: &Entity<D>) {
        match self.snapshot(entity) {
            Ok(document) => {
                self.queue.push(Task::insert(self.collection.clone(), entity.id().clone(), document));
            }
            Err(err) => self.snapshot_failed(entity, "insert", err),
        }
    }

    fn entity_updated(&self, entity: &Entity<D>) {
        match self.snapshot(entity) {
            Ok(document) => {
                let key = DocumentMapper::primary_key_of(entity);
                self.queue.push(Task::replace(self.collection.clone(), entity.id().clone(), key, document));
            }
            Err(err) => self.snapshot_failed(entity, "replace", err),
        }
    }

    fn entity_deleted(&self, entity: &Entity<D>) {
        let key = DocumentMapper::primary_key_of(entity);
        self.queue.push(Task::delete(self.collection.clone(), entity.id().clone(), key));
    }

    fn snapshot(&self, entity: &Entity<D>) -> Result<Document, SerializationError> {
        let raw = self.serializer.serialize(entity.id(), &entity.read())?;
        let mut document = DocumentMapper::to_document(raw);
        if let Ok(None) = document.key() {
            // keep the document addressable by later replaces and deletes
            action_warn!(self, "snapshot without id", "{}", entity.id());
            document.set_key(&DocumentMapper::primary_key_of(entity));
        }
        Ok(document)
    }

    // Nothing is enqueued, so the store keeps its previous version of the entity
    fn snapshot_failed(&self, entity: &Entity<D>, operation: &str, err: SerializationError) {
        action_error!(self, "snapshot failed", "{} {}: {}", operation, entity.id(), err);
    }
}

impl<D: Send + Sync + 'static> EntityEventListener<D> for PersistenceLayer<D> {
    fn notify(&self, event: EntityEvent<'_, D>) {
        debug!("{} {} {}", self, event.kind(), event.entity().id());
        match event {
            EntityEvent::Created(entity) => self.entity_created(entity),
            EntityEvent::PostUpdate(entity) => self.entity_updated(entity),
            EntityEvent::PreDelete(entity) => self.entity_deleted(entity),
        }
    }
}

impl<D> std::fmt::Display for PersistenceLayer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "PersistenceLayer({})", self.collection.name()) }
}
