//! Lazy relationship pointers.
//!
//! A pointer stores raw ids plus a weak handle to the repository that owns the target entities.
//! Nothing is resolved until the caller asks for the entity, so targets may be registered in any
//! order (or not at all yet). Both pointer kinds serialize as raw ids only.

use serde::{Serialize, Serializer};

use crate::{
    entity::{Entity, EntityId},
    repository::{Repository, WeakRepository},
};

/// To-one relationship: a nullable id.
pub struct ToOne<T> {
    id: Option<EntityId>,
    repository: WeakRepository<T>,
}

impl<T> ToOne<T> {
    pub fn new(repository: &Repository<T>, id: Option<EntityId>) -> Self { Self { id, repository: repository.downgrade() } }

    pub fn empty(repository: &Repository<T>) -> Self { Self::new(repository, None) }

    pub fn id(&self) -> Option<&EntityId> { self.id.as_ref() }

    pub fn is_set(&self) -> bool { self.id.is_some() }

    /// Resolve the target. `None` when unset, dangling, or the repository is gone.
    pub fn entity(&self) -> Option<Entity<T>> { self.repository.upgrade()?.get_entity(self.id.as_ref()?) }

    pub fn set(&mut self, id: EntityId) -> Option<EntityId> { self.id.replace(id) }

    pub fn clear(&mut self) -> Option<EntityId> { self.id.take() }
}

/// To-many relationship: an ordered set of ids, kept in insertion order.
pub struct ToMany<T> {
    ids: Vec<EntityId>,
    repository: WeakRepository<T>,
}

impl<T> ToMany<T> {
    pub fn new(repository: &Repository<T>, ids: impl IntoIterator<Item = EntityId>) -> Self {
        let mut pointer = Self::empty(repository);
        for id in ids {
            pointer.add(id);
        }
        pointer
    }

    pub fn empty(repository: &Repository<T>) -> Self { Self { ids: Vec::new(), repository: repository.downgrade() } }

    pub fn ids(&self) -> &[EntityId] { &self.ids }

    pub fn contains(&self, id: &EntityId) -> bool { self.ids.contains(id) }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Resolve every target that currently exists, in pointer order. Dangling ids are skipped.
    pub fn entities(&self) -> Vec<Entity<T>> {
        match self.repository.upgrade() {
            Some(repository) => self.ids.iter().filter_map(|id| repository.get_entity(id)).collect(),
            None => Vec::new(),
        }
    }

    /// Returns false if the id was already present
    pub fn add(&mut self, id: EntityId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: &EntityId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|i| i != id);
        self.ids.len() != before
    }
}

impl<T> Clone for ToOne<T> {
    fn clone(&self) -> Self { Self { id: self.id.clone(), repository: self.repository.clone() } }
}

impl<T> Clone for ToMany<T> {
    fn clone(&self) -> Self { Self { ids: self.ids.clone(), repository: self.repository.clone() } }
}

impl<T> PartialEq for ToOne<T> {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl<T> PartialEq for ToMany<T> {
    fn eq(&self, other: &Self) -> bool { self.ids == other.ids }
}

impl<T> std::fmt::Debug for ToOne<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "ToOne({:?})", self.id) }
}

impl<T> std::fmt::Debug for ToMany<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "ToMany({:?})", self.ids) }
}

impl<T> Serialize for ToOne<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { self.id.serialize(serializer) }
}

impl<T> Serialize for ToMany<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> { self.ids.serialize(serializer) }
}
