//! graphmirror document store using Sled
//!
//! Each collection is a sled tree named `collection_{name}`. Documents are stored as JSON under the
//! bytes of their primary key, so the natural cursor order is key order.
//!
//! ```rust,ignore
//! use graphmirror_storage_sled::SledDocumentStore;
//!
//! let store = SledDocumentStore::with_homedir_folder(".graphmirror")?;
//! let people = store.collection("people").await?;
//! ```

mod collection;
mod engine;
mod error;

pub use collection::SledCollection;
pub use engine::SledDocumentStore;
pub use error::SledStoreError;
