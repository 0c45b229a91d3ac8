use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{
    error::RepositoryError,
    repository::{Repository, WeakRepository},
};

/// Identifier of an entity within its repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh, time-ordered id
    pub fn new() -> Self { Self(Ulid::new().to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn into_string(self) -> String { self.0 }
}

impl Default for EntityId {
    fn default() -> Self { Self::new() }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self { Self(id) }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self { Self(id.to_owned()) }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// An entity represents a unique thing within a repository.
///
/// This is a cheap shared handle; clones refer to the same underlying data.
pub struct Entity<D>(Arc<EntityInner<D>>);

struct EntityInner<D> {
    id: EntityId,
    data: RwLock<D>,
    repository: WeakRepository<D>,
}

impl<D> Clone for Entity<D> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<D> Entity<D> {
    pub(crate) fn new(id: EntityId, data: D, repository: WeakRepository<D>) -> Self {
        Self(Arc::new(EntityInner { id, data: RwLock::new(data), repository }))
    }

    pub fn id(&self) -> &EntityId { &self.0.id }

    /// Read the current state. Do not hold the guard across an `update` of the same entity.
    pub fn read(&self) -> RwLockReadGuard<'_, D> { self.0.data.read().expect("Failed to lock entity data") }

    pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }

    pub fn repository(&self) -> Option<Repository<D>> { self.0.repository.upgrade() }
}

impl<D: Send + Sync + 'static> Entity<D> {
    /// Mutate the entity in place, then raise `PostUpdate` to the repository's listeners.
    ///
    /// Fails if the entity has been deleted (or its repository dropped).
    pub fn update<R>(&self, f: impl FnOnce(&mut D) -> R) -> Result<R, RepositoryError> {
        let repository = self.registered_repository()?;
        let result = {
            let mut data = self.0.data.write().expect("Failed to lock entity data");
            f(&mut data)
        };
        repository.entity_updated(self);
        Ok(result)
    }

    pub fn delete(&self) -> Result<(), RepositoryError> { self.registered_repository()?.delete_entity(self.id()) }

    fn registered_repository(&self) -> Result<Repository<D>, RepositoryError> {
        match self.0.repository.upgrade() {
            Some(repository) if repository.get_entity(self.id()).is_some_and(|e| e.ptr_eq(self)) => Ok(repository),
            _ => Err(RepositoryError::NotFound(self.id().clone())),
        }
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for Entity<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity").field("id", &self.0.id).field("data", &*self.read()).finish()
    }
}

impl<D> std::fmt::Display for Entity<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Entity({})", self.0.id) }
}
