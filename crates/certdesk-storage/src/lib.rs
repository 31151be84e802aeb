//! Document store abstraction for `CertDesk`.
//!
//! This crate defines the [`DocumentStore`] trait: a small document-database
//! interface (create, set, get, update, delete, equality-filter queries with
//! ordering, and a change feed for live queries). It knows nothing about
//! certificates, projects, or any other record type; `certdesk-core` owns
//! the collections and their schemas.
//!
//! Three implementations are provided:
//!
//! - [`MemoryStore`]: in-memory, for tests and local development
//! - [`RocksDbStore`]: embedded persistent store (feature `rocksdb-backend`)
//! - [`PostgresStore`]: JSONB documents in PostgreSQL (feature `postgres-backend`)

mod document;
mod error;
mod memory;
#[cfg(feature = "postgres-backend")]
mod postgres_backend;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use document::{
    compare_values, new_document_id, ChangeEvent, ChangeFeed, ChangeKind, Direction, Document,
    Fields, Filter, Query,
};
pub use error::StorageError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres-backend")]
pub use postgres_backend::PostgresStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbStore;

use tokio::sync::broadcast;

/// A pluggable document store.
///
/// Collections are UTF-8 paths using `/` as a separator (e.g.
/// `artifacts/certdesk/public/data/certificates`). Document ids never contain
/// `/`. Every successful mutation is published on the store's change feed.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Create a document with a store-generated id and return that id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StorageError>;

    /// Write a document under a caller-chosen id, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StorageError>;

    /// Fetch a document by id. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StorageError>;

    /// Merge `fields` into an existing document. Fields not named in the
    /// update are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DocumentNotFound`] if the document does not
    /// exist, or [`StorageError::Write`] if the backend fails.
    async fn update(&self, collection: &str, id: &str, fields: Fields)
        -> Result<(), StorageError>;

    /// Delete a document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError>;

    /// Run a query against one collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError>;

    /// Subscribe to the change feed for all collections.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Whether `key` names a document directly inside `collection` (and not in a
/// nested sub-collection). Returns the document id if so.
pub(crate) fn document_id_in<'a>(collection: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(collection)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::document_id_in;

    #[test]
    fn document_id_in_rejects_nested_and_foreign_keys() {
        assert_eq!(document_id_in("a/certs", "a/certs/x1"), Some("x1"));
        assert_eq!(document_id_in("a/certs", "a/certs/x1/sub/y"), None);
        assert_eq!(document_id_in("a/certs", "a/certsx/y"), None);
        assert_eq!(document_id_in("a/certs", "a/certs/"), None);
    }
}
