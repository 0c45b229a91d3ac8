//! Relationship helpers that keep both sides of a link consistent.
//!
//! Each helper is described by plain field accessors (see [`field!`](crate::field)). Every entity
//! whose pointer changes is mutated through [`Entity::update`], so each side raises its own
//! `PostUpdate` and gets persisted independently.

use crate::{
    entity::{Entity, EntityId},
    error::RepositoryError,
    pointer::{ToMany, ToOne},
};

/// Shared and exclusive accessors for one field of `S`.
pub struct Field<S, P> {
    get: fn(&S) -> &P,
    get_mut: fn(&mut S) -> &mut P,
}

impl<S, P> Field<S, P> {
    pub fn new(get: fn(&S) -> &P, get_mut: fn(&mut S) -> &mut P) -> Self { Self { get, get_mut } }
}

impl<S, P> Clone for Field<S, P> {
    fn clone(&self) -> Self { *self }
}

impl<S, P> Copy for Field<S, P> {}

/// Build a [`Field`] for a named struct field: `field!(Person, best_friend)`.
#[macro_export]
macro_rules! field {
    ($ty:ty, $name:ident) => {
        $crate::relationship::Field::new(|s: &$ty| &s.$name, |s: &mut $ty| &mut s.$name)
    };
}

pub type OneField<S, T> = Field<S, ToOne<T>>;
pub type ManyField<S, T> = Field<S, ToMany<T>>;

/// Clear `entity`'s to-one pointer, but only while it still points at `target`.
fn detach_one<S: Send + Sync + 'static, T>(entity: &Entity<S>, field: OneField<S, T>, target: &EntityId) -> Result<(), RepositoryError> {
    let points_to_target = (field.get)(&entity.read()).id() == Some(target);
    if points_to_target {
        entity.update(|d| (field.get_mut)(d).clear())?;
    }
    Ok(())
}

fn detach_many<S: Send + Sync + 'static, T>(entity: &Entity<S>, field: ManyField<S, T>, target: &EntityId) -> Result<(), RepositoryError> {
    let contains_target = (field.get)(&entity.read()).contains(target);
    if contains_target {
        entity.update(|d| (field.get_mut)(d).remove(target))?;
    }
    Ok(())
}

pub struct OneToOneRelationship<A, B> {
    a_to_b: OneField<A, B>,
    b_to_a: OneField<B, A>,
}

impl<A: Send + Sync + 'static, B: Send + Sync + 'static> OneToOneRelationship<A, B> {
    pub fn new(a_to_b: OneField<A, B>, b_to_a: OneField<B, A>) -> Self { Self { a_to_b, b_to_a } }

    /// Link `a` and `b`, detaching any previous partner of either side.
    pub fn set(&self, a: &Entity<A>, b: &Entity<B>) -> Result<(), RepositoryError> {
        let previous_b = (self.a_to_b.get)(&a.read()).entity().filter(|old| old.id() != b.id());
        let previous_a = (self.b_to_a.get)(&b.read()).entity().filter(|old| old.id() != a.id());

        a.update(|d| (self.a_to_b.get_mut)(d).set(b.id().clone()))?;
        b.update(|d| (self.b_to_a.get_mut)(d).set(a.id().clone()))?;

        if let Some(old) = previous_b {
            detach_one(&old, self.b_to_a, a.id())?;
        }
        if let Some(old) = previous_a {
            detach_one(&old, self.a_to_b, b.id())?;
        }
        Ok(())
    }

    /// Detach `a` from its partner, if any.
    pub fn unset(&self, a: &Entity<A>) -> Result<(), RepositoryError> {
        let partner = (self.a_to_b.get)(&a.read()).entity();
        a.update(|d| (self.a_to_b.get_mut)(d).clear())?;
        if let Some(partner) = partner {
            detach_one(&partner, self.b_to_a, a.id())?;
        }
        Ok(())
    }
}

/// `A` holds many `B`s; every `B` points back at a single `A`.
pub struct OneToManyRelationship<A, B> {
    a_to_bs: ManyField<A, B>,
    b_to_a: OneField<B, A>,
}

impl<A: Send + Sync + 'static, B: Send + Sync + 'static> OneToManyRelationship<A, B> {
    pub fn new(a_to_bs: ManyField<A, B>, b_to_a: OneField<B, A>) -> Self { Self { a_to_bs, b_to_a } }

    /// Attach `b` to `a`, moving it away from its previous owner if it had one.
    pub fn add(&self, a: &Entity<A>, b: &Entity<B>) -> Result<(), RepositoryError> {
        let previous_owner = (self.b_to_a.get)(&b.read()).entity().filter(|old| old.id() != a.id());

        a.update(|d| (self.a_to_bs.get_mut)(d).add(b.id().clone()))?;
        b.update(|d| (self.b_to_a.get_mut)(d).set(a.id().clone()))?;

        if let Some(old) = previous_owner {
            detach_many(&old, self.a_to_bs, b.id())?;
        }
        Ok(())
    }

    pub fn remove(&self, a: &Entity<A>, b: &Entity<B>) -> Result<(), RepositoryError> {
        detach_many(a, self.a_to_bs, b.id())?;
        detach_one(b, self.b_to_a, a.id())
    }
}

pub struct ManyToManyRelationship<A, B> {
    a_to_bs: ManyField<A, B>,
    b_to_as: ManyField<B, A>,
}

impl<A: Send + Sync + 'static, B: Send + Sync + 'static> ManyToManyRelationship<A, B> {
    pub fn new(a_to_bs: ManyField<A, B>, b_to_as: ManyField<B, A>) -> Self { Self { a_to_bs, b_to_as } }

    pub fn add(&self, a: &Entity<A>, b: &Entity<B>) -> Result<(), RepositoryError> {
        a.update(|d| (self.a_to_bs.get_mut)(d).add(b.id().clone()))?;
        b.update(|d| (self.b_to_as.get_mut)(d).add(a.id().clone()))?;
        Ok(())
    }

    pub fn remove(&self, a: &Entity<A>, b: &Entity<B>) -> Result<(), RepositoryError> {
        detach_many(a, self.a_to_bs, b.id())?;
        detach_many(b, self.b_to_as, a.id())
    }
}
