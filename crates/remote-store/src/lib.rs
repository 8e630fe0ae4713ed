//! # Remote Store
//!
//! The contract between the sync engine and the remote document store.
//!
//! The store is addressed as `collection/id`, one JSON document per key.
//! Every engine component talks to it through [`RemoteStore`]; the concrete
//! backend lives outside this workspace. [`InMemoryStore`] is a complete
//! implementation used by tests and offline embedding: it records writes,
//! detects overlapping writes to the same document and can inject failures.
//!
//! ```text
//! engine ──get/set/update──▶ RemoteStore ──push──▶ Subscription ──▶ reconciler
//! ```

mod document;
mod error;
mod memory;
mod subscription;

pub use document::{merge_documents, stamp_updated_at, Document, UPDATED_AT_FIELD};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, WriteOp, WriteRecord};
pub use subscription::{RemotePush, Subscription};

use async_trait::async_trait;

/// Abstract get/set/update/subscribe surface of the remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read a document. `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Write a document. With `merge`, fields are merged into the existing
    /// document instead of replacing it.
    async fn set(&self, collection: &str, id: &str, data: Document, merge: bool)
        -> StoreResult<()>;

    /// Overwrite the given top-level fields of an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] when the document does not exist.
    async fn update(&self, collection: &str, id: &str, partial: Document) -> StoreResult<()>;

    /// Register for pushes of `collection/id`. Dropping the returned
    /// [`Subscription`] unsubscribes.
    fn subscribe(&self, collection: &str, id: &str) -> StoreResult<Subscription>;
}
