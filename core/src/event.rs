use crate::entity::Entity;

/// A lifecycle notification raised by a [`Repository`](crate::repository::Repository).
///
/// Every variant borrows the entity it concerns. For `PreDelete` the entity is still registered and
/// its id is still valid; it is removed right after all listeners return.
pub enum EntityEvent<'a, D> {
    Created(&'a Entity<D>),
    PostUpdate(&'a Entity<D>),
    PreDelete(&'a Entity<D>),
}

// Manual impls: a derive would require `D: Clone`
impl<D> Clone for EntityEvent<'_, D> {
    fn clone(&self) -> Self { *self }
}

impl<D> Copy for EntityEvent<'_, D> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEventKind {
    Created,
    PostUpdate,
    PreDelete,
}

impl<'a, D> EntityEvent<'a, D> {
    pub fn entity(&self) -> &'a Entity<D> {
        match self {
            EntityEvent::Created(entity) | EntityEvent::PostUpdate(entity) | EntityEvent::PreDelete(entity) => entity,
        }
    }

    pub fn kind(&self) -> EntityEventKind {
        match self {
            EntityEvent::Created(_) => EntityEventKind::Created,
            EntityEvent::PostUpdate(_) => EntityEventKind::PostUpdate,
            EntityEvent::PreDelete(_) => EntityEventKind::PreDelete,
        }
    }
}

impl std::fmt::Display for EntityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityEventKind::Created => write!(f, "created"),
            EntityEventKind::PostUpdate => write!(f, "post_update"),
            EntityEventKind::PreDelete => write!(f, "pre_delete"),
        }
    }
}

/// Subscriber to the lifecycle of the entities held by one repository.
///
/// Listeners are called synchronously on the mutating thread and must not block.
pub trait EntityEventListener<D>: Send + Sync {
    fn notify(&self, event: EntityEvent<'_, D>);
}
