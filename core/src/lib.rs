pub mod document;
pub mod entity;
pub mod error;
pub mod event;
pub mod filler;
pub mod persistence;
pub mod pointer;
pub mod queue;
pub mod relationship;
pub mod repository;
pub mod serializer;
pub mod storage;
pub mod task;
pub mod util;

pub use document::{Document, DocumentMapper, PrimaryKey};
pub use entity::{Entity, EntityId};
pub use event::{EntityEvent, EntityEventKind, EntityEventListener};
pub use filler::RepositoryFiller;
pub use persistence::PersistenceLayer;
pub use pointer::{ToMany, ToOne};
pub use queue::{FailurePolicy, QueueConfig, QueueStatus, Task, TaskFailure, TaskQueue};
pub use relationship::{ManyToManyRelationship, OneToManyRelationship, OneToOneRelationship};
pub use repository::Repository;
pub use serializer::{EntitySerializer, RawEntity, RecordCodec};
pub use storage::{CollectionHandle, DocumentCollection, DocumentStore};
