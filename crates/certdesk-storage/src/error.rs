//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger: the collection, the document id where one applies,
//! and the backend's own reason string.

/// Errors that can occur during document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to open or connect to the storage backend.
    #[error("failed to open storage at '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to read a document or run a query.
    #[error("failed to read from '{collection}': {reason}")]
    Read { collection: String, reason: String },

    /// Failed to write a document.
    #[error("failed to write '{collection}/{id}': {reason}")]
    Write {
        collection: String,
        id: String,
        reason: String,
    },

    /// Failed to delete a document.
    #[error("failed to delete '{collection}/{id}': {reason}")]
    Delete {
        collection: String,
        id: String,
        reason: String,
    },

    /// An update targeted a document that does not exist.
    #[error("document '{collection}/{id}' does not exist")]
    DocumentNotFound { collection: String, id: String },

    /// A stored document could not be encoded or decoded.
    #[error("corrupt document '{collection}/{id}': {reason}")]
    Corrupt {
        collection: String,
        id: String,
        reason: String,
    },

    /// The backend refused the operation for lack of permission.
    #[error("permission denied on '{collection}': {reason}")]
    PermissionDenied { collection: String, reason: String },
}
