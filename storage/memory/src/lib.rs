//! In-process document store for graphmirror
//!
//! Collections live in memory and iterate in insertion order, the way a document store's natural
//! cursor order usually follows insertion. Useful for tests and for embedding without a server.
//!
//! ```rust,ignore
//! use graphmirror_storage_memory::MemoryDocumentStore;
//!
//! let store = MemoryDocumentStore::new();
//! let people = store.collection("people").await?;
//! ```

mod collection;
mod engine;

pub use collection::MemoryCollection;
pub use engine::MemoryDocumentStore;
