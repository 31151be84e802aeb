//! Bounded, namespaced access to the document store.
//!
//! Every record type in `certdesk-core` talks to the store through a
//! [`Repository`]. It resolves collection names under the configured
//! namespace, wraps each call in a timeout, and converts records to and from
//! their document form.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use certdesk_storage::{Document, DocumentStore, Fields, Query, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Namespaced, timeout-bounded handle on a [`DocumentStore`].
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    namespace: String,
    timeout: Duration,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Create a repository rooted at `namespace` (e.g.
    /// `artifacts/certdesk/public/data`). Leading and trailing slashes are
    /// ignored; an empty namespace places collections at the top level.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, namespace: &str, timeout: Duration) -> Self {
        Self {
            store,
            namespace: namespace.trim_matches('/').to_owned(),
            timeout,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full path of a named collection.
    #[must_use]
    pub fn collection(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", self.namespace)
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(operation, after_ms, "store call timed out");
                Err(StoreError::Timeout {
                    operation,
                    after_ms,
                })
            }
        }
    }

    /// Create a document with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or timeout.
    pub async fn create(&self, name: &str, fields: Fields) -> Result<String, StoreError> {
        let path = self.collection(name);
        self.bounded("create", self.store.create(&path, fields)).await
    }

    /// Write a document under a chosen id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or timeout.
    pub async fn set(&self, name: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let path = self.collection(name);
        self.bounded("set", self.store.set(&path, id, fields)).await
    }

    /// Fetch a document by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or timeout.
    pub async fn get(&self, name: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let path = self.collection(name);
        self.bounded("get", self.store.get(&path, id)).await
    }

    /// Merge fields into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or timeout; a missing
    /// document is reported as [`StorageError::DocumentNotFound`].
    pub async fn update(&self, name: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let path = self.collection(name);
        self.bounded("update", self.store.update(&path, id, fields))
            .await
    }

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or timeout.
    pub async fn delete(&self, name: &str, id: &str) -> Result<(), StoreError> {
        let path = self.collection(name);
        self.bounded("delete", self.store.delete(&path, id)).await
    }

    /// Run a query against a named collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failure or timeout.
    pub async fn query(&self, name: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let path = self.collection(name);
        self.bounded("query", self.store.query(&path, query)).await
    }
}

/// Convert a record into document fields.
///
/// # Errors
///
/// Returns [`StoreError::Malformed`] if the record does not serialize to a
/// JSON object.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Malformed {
            id: String::new(),
            reason: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(StoreError::Malformed {
            id: String::new(),
            reason: e.to_string(),
        }),
    }
}

/// Decode a document into a record.
///
/// # Errors
///
/// Returns [`StoreError::Malformed`] if the fields do not match the record.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    let id = doc.id;
    serde_json::from_value(Value::Object(doc.fields))
        .map_err(|e| StoreError::Malformed { id, reason: e.to_string() })
}

/// Decode every document, skipping (and logging) the ones that don't fit.
///
/// Listings stay usable when a single stored record has been hand-edited
/// into an invalid shape.
pub fn decode_all<T, F>(docs: Vec<Document>, mut attach_id: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: FnMut(&mut T, String),
{
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match from_document::<T>(doc) {
                Ok(mut record) => {
                    attach_id(&mut record, id);
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed record");
                    None
                }
            }
        })
        .collect()
}
