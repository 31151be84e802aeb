//! HTTP error types for `CertDesk` server.
//!
//! Maps domain errors from `certdesk-core` into appropriate HTTP responses.
//! Every error variant produces a JSON body with a machine-readable `error`
//! field and a human-readable `message`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use certdesk_core::error::{AuthError, CatalogError, CertificateError};

/// Message shown for every transient store failure. The cause is logged.
pub const UNAVAILABLE_MESSAGE: &str = "the service is temporarily unavailable, please try again later";

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid input.
    Validation(String),
    /// Missing, unknown, or expired credentials.
    Unauthorized(String),
    /// Authenticated, but not the admin.
    AccessDenied(String),
    /// Requested resource not found.
    NotFound(String),
    /// The store failed or refused the operation.
    StoreUnavailable,
    /// The store did not answer in time.
    Timeout,
    /// A sign-in method was requested that this server has not configured.
    NotConfigured(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::NotConfigured(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::AccessDenied(_) => "access_denied",
            Self::NotFound(_) => "not_found",
            Self::StoreUnavailable => "store_unavailable",
            Self::Timeout => "timeout",
            Self::NotConfigured(_) => "not_configured",
        }
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::AccessDenied(msg)
            | Self::NotFound(msg)
            | Self::NotConfigured(msg) => msg.clone(),
            Self::StoreUnavailable => UNAVAILABLE_MESSAGE.to_owned(),
            Self::Timeout => "the request took too long, please try again".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.message(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<CertificateError> for AppError {
    fn from(err: CertificateError) -> Self {
        match err {
            CertificateError::Validation { .. } => Self::Validation(err.to_string()),
            CertificateError::NotFound { .. } => Self::NotFound(err.to_string()),
            CertificateError::StoreUnavailable { ref reason } => {
                warn!(%reason, "certificate store unavailable");
                Self::StoreUnavailable
            }
            CertificateError::Timeout { .. } => {
                warn!(error = %err, "certificate store timed out");
                Self::Timeout
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation { .. } => Self::Validation(err.to_string()),
            CatalogError::NotFound { .. } => Self::NotFound(err.to_string()),
            CatalogError::StoreUnavailable { ref reason } => {
                warn!(%reason, "catalog store unavailable");
                Self::StoreUnavailable
            }
            CatalogError::Timeout { .. } => {
                warn!(error = %err, "catalog store timed out");
                Self::Timeout
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized { .. } => Self::Unauthorized(err.to_string()),
            AuthError::AccessDenied { .. } => Self::AccessDenied(err.to_string()),
            AuthError::NotConfigured { .. } => Self::NotConfigured(err.to_string()),
            AuthError::StoreUnavailable { ref reason } => {
                warn!(%reason, "session store unavailable");
                Self::StoreUnavailable
            }
            AuthError::Timeout { .. } => {
                warn!(error = %err, "session store timed out");
                Self::Timeout
            }
        }
    }
}
