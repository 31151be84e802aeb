//! Error types for `certdesk-core`.
//!
//! Store failures never cross a component boundary raw: each component
//! translates [`StoreError`] into its own taxonomy, keeping "the record does
//! not exist" distinct from "the store could not answer".

use certdesk_storage::StorageError;

/// Errors from a bounded call against the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage backend returned an error.
    #[error("store error: {0}")]
    Storage(#[from] StorageError),

    /// The call did not complete within the configured bound.
    #[error("store {operation} timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// A record could not be converted to or from its document form.
    #[error("malformed record '{id}': {reason}")]
    Malformed { id: String, reason: String },
}

impl StoreError {
    /// Whether this is the backend reporting a missing document on update.
    #[must_use]
    pub fn is_missing_document(&self) -> bool {
        matches!(self, Self::Storage(StorageError::DocumentNotFound { .. }))
    }
}

/// Errors from the certificate store and the verification endpoint.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// Required issuance fields were missing or malformed.
    #[error("invalid certificate request: {reason}")]
    Validation { reason: String },

    /// No certificate carries the requested code.
    #[error("certificate not found: {code}")]
    NotFound { code: String },

    /// The backing store failed or refused the operation.
    #[error("certificate store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The backing store did not answer in time.
    ///
    /// A timed-out write is abandoned, not cancelled: a backend that runs
    /// writes on a blocking thread (`RocksDB`) may still store the
    /// certificate afterwards. Check the listing before issuing again; the
    /// code of an abandoned issuance is logged.
    #[error("certificate store timed out after {after_ms} ms during {operation}")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

impl From<StoreError> for CertificateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout {
                operation,
                after_ms,
            } => Self::Timeout {
                operation,
                after_ms,
            },
            StoreError::Storage(_) | StoreError::Malformed { .. } => Self::StoreUnavailable {
                reason: err.to_string(),
            },
        }
    }
}

/// Errors from project, testimonial, and contact submission operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Required fields were missing or out of range.
    #[error("invalid {kind}: {reason}")]
    Validation { kind: &'static str, reason: String },

    /// The record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The backing store failed or refused the operation.
    #[error("catalog store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The backing store did not answer in time.
    #[error("catalog store timed out after {after_ms} ms during {operation}")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout {
                operation,
                after_ms,
            } => Self::Timeout {
                operation,
                after_ms,
            },
            StoreError::Storage(_) | StoreError::Malformed { .. } => Self::StoreUnavailable {
                reason: err.to_string(),
            },
        }
    }
}

impl CatalogError {
    /// Translate the error from merging into `kind` record `id`, reporting a
    /// missing document as [`CatalogError::NotFound`].
    pub(crate) fn on_update(err: StoreError, kind: &'static str, id: &str) -> Self {
        if err.is_missing_document() {
            Self::NotFound {
                kind,
                id: id.to_owned(),
            }
        } else {
            err.into()
        }
    }
}

/// Errors from admin authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing, unknown, or expired credentials.
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The email is not the authorised admin address.
    #[error("access denied for '{email}'")]
    AccessDenied { email: String },

    /// The requested sign-in method is not configured.
    #[error("sign-in method not configured: {method}")]
    NotConfigured { method: &'static str },

    /// The backing store failed or refused the operation.
    #[error("session store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The backing store did not answer in time.
    #[error("session store timed out after {after_ms} ms during {operation}")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout {
                operation,
                after_ms,
            } => Self::Timeout {
                operation,
                after_ms,
            },
            StoreError::Storage(_) | StoreError::Malformed { .. } => Self::StoreUnavailable {
                reason: err.to_string(),
            },
        }
    }
}
