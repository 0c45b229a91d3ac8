use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use crate::{
    entity::{Entity, EntityId},
    error::RepositoryError,
    event::{EntityEvent, EntityEventListener},
    util::SafeMap,
};

pub type IdGenerator = Box<dyn Fn() -> EntityId + Send + Sync>;

/// In-memory registry of the entities of one type, keyed by id.
///
/// Entities are kept in insertion order. Every mutation made through the repository (or through an
/// [`Entity`] handle it issued) is announced to the registered listeners.
pub struct Repository<D>(Arc<RepositoryInner<D>>);

pub(crate) struct RepositoryInner<D> {
    name: String,
    entities: SafeMap<EntityId, Entity<D>>,
    listeners: RwLock<Vec<Arc<dyn EntityEventListener<D>>>>,
    id_generator: IdGenerator,
}

/// Non-owning handle to a repository, used by entities and relationship pointers.
pub struct WeakRepository<D>(Weak<RepositoryInner<D>>);

impl<D> Clone for Repository<D> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<D> Clone for WeakRepository<D> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<D> WeakRepository<D> {
    /// A handle that never resolves
    pub fn dangling() -> Self { Self(Weak::new()) }

    pub fn upgrade(&self) -> Option<Repository<D>> { self.0.upgrade().map(Repository) }
}

impl<D> Repository<D> {
    pub fn new(name: impl Into<String>) -> Self { Self::with_id_generator(name, Box::new(EntityId::new)) }

    pub fn with_id_generator(name: impl Into<String>, id_generator: IdGenerator) -> Self {
        Self(Arc::new(RepositoryInner {
            name: name.into(),
            entities: SafeMap::new(),
            listeners: RwLock::new(Vec::new()),
            id_generator,
        }))
    }

    pub fn name(&self) -> &str { &self.0.name }

    pub fn downgrade(&self) -> WeakRepository<D> { WeakRepository(Arc::downgrade(&self.0)) }

    pub fn get_entity(&self, id: &EntityId) -> Option<Entity<D>> { self.0.entities.get(id) }

    pub fn contains(&self, id: &EntityId) -> bool { self.0.entities.contains_key(id) }

    /// All entities in insertion order
    pub fn get_all_entities(&self) -> Vec<Entity<D>> { self.0.entities.values() }

    pub fn len(&self) -> usize { self.0.entities.len() }

    pub fn is_empty(&self) -> bool { self.0.entities.is_empty() }

    pub fn register_listener(&self, listener: Arc<dyn EntityEventListener<D>>) {
        self.0.listeners.write().expect("Failed to lock listeners").push(listener);
    }

    pub fn listener_count(&self) -> usize { self.0.listeners.read().expect("Failed to lock listeners").len() }

    fn emit(&self, event: EntityEvent<'_, D>) {
        // Clone the list so listeners may register further listeners without deadlocking
        let listeners = self.0.listeners.read().expect("Failed to lock listeners").clone();
        for listener in listeners {
            listener.notify(event);
        }
    }
}

impl<D: Send + Sync + 'static> Repository<D> {
    /// Register a new entity under a freshly generated id and raise `Created`.
    pub fn create_entity(&self, data: D) -> Entity<D> {
        let id = loop {
            let id = (self.0.id_generator)();
            if !self.0.entities.contains_key(&id) {
                break id;
            }
        };
        let entity = Entity::new(id.clone(), data, self.downgrade());
        self.0.entities.insert(id.clone(), entity.clone());
        debug!("{}.create_entity {}", self.0.name, id);
        self.emit(EntityEvent::Created(&entity));
        entity
    }

    /// Register an entity under an externally supplied id, bypassing id generation, and raise `Created`.
    pub fn create_entity_with_id(&self, data: D, id: EntityId) -> Result<Entity<D>, RepositoryError> {
        let entity = Entity::new(id.clone(), data, self.downgrade());
        if !self.0.entities.insert_if_absent(id.clone(), entity.clone()) {
            return Err(RepositoryError::DuplicateId(id));
        }
        debug!("{}.create_entity_with_id {}", self.0.name, id);
        self.emit(EntityEvent::Created(&entity));
        Ok(entity)
    }

    /// Raise `PreDelete` while the entity is still registered, then remove it.
    pub fn delete_entity(&self, id: &EntityId) -> Result<(), RepositoryError> {
        let entity = self.0.entities.get(id).ok_or_else(|| RepositoryError::NotFound(id.clone()))?;
        self.emit(EntityEvent::PreDelete(&entity));
        self.0.entities.remove(id);
        debug!("{}.delete_entity {}", self.0.name, id);
        Ok(())
    }

    pub(crate) fn entity_updated(&self, entity: &Entity<D>) {
        debug!("{}.update_entity {}", self.0.name, entity.id());
        self.emit(EntityEvent::PostUpdate(entity));
    }
}

impl<D> std::fmt::Debug for Repository<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Repository({}, {} entities)", self.0.name, self.0.entities.len())
    }
}
