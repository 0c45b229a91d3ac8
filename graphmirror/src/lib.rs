//! # graphmirror
//!
//! graphmirror keeps an in-memory graph of entities synchronized, one way, into a document store.
//! Mutations are applied in memory immediately; the matching store writes are queued and replayed
//! in order in the background.
//!
//! ## Core Concepts
//!
//! - **Repository**: the in-memory registry of the entities of one type
//! - **Entity**: an identified object with scalar fields and relationship pointers
//! - **Document**: the flat store-side record of one entity, keyed by `_id`
//! - **PersistenceLayer**: listens to one repository and enqueues a store write per lifecycle event
//! - **TaskQueue**: the single ordered queue shared by every persistence layer
//! - **RepositoryFiller**: loads a collection back into an empty repository at startup
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graphmirror::{storage::DocumentStore, memory::MemoryDocumentStore, PersistenceLayer, QueueConfig, RepositoryFiller, TaskQueue};
//!
//! let store = MemoryDocumentStore::new();
//! let collection = store.collection("people").await?;
//! let people = Repository::new("people");
//!
//! // Load what the store already holds, then start mirroring
//! RepositoryFiller::new(codec.clone(), collection.clone()).fill_repository(&people).await?;
//! let queue = TaskQueue::new(QueueConfig::from_env()?)?;
//! people.register_listener(Arc::new(PersistenceLayer::new(collection, codec, queue.clone())));
//!
//! people.create_entity(Person::new(&people, "giorgio"));
//! queue.wait_idle().await;
//! ```
//!
//! ## Design Philosophy
//!
//! - The store is a mirror: memory is the source of truth while the process runs
//! - Documents are captured when the event fires, so later mutations never leak into earlier writes
//! - Store writes run one at a time, in event order, across every collection
//! - Relationship pointers hold raw ids and resolve lazily, so loading order never matters

pub use graphmirror_core as core;
#[cfg(feature = "memory")]
pub use graphmirror_storage_memory as memory;
#[cfg(feature = "sled")]
pub use graphmirror_storage_sled as sled;

// Re-export commonly used types
pub use graphmirror_core::{
    error, field, relationship, storage, Document, DocumentMapper, Entity, EntityEvent, EntityEventListener, EntityId,
    EntitySerializer, FailurePolicy, PersistenceLayer, PrimaryKey, QueueConfig, QueueStatus, RecordCodec, Repository,
    RepositoryFiller, TaskFailure, TaskQueue, ToMany, ToOne,
};
