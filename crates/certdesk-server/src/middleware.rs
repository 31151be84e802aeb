//! Admin authentication middleware for `CertDesk`.
//!
//! Extracts the `Authorization: Bearer <token>` header, resolves it to an
//! admin session, and injects an [`AdminContext`] into the request
//! extensions for downstream handlers.
//!
//! Browser WebSockets cannot set headers, so a live listing may instead
//! offer `Sec-WebSocket-Protocol: bearer, <token>`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use certdesk_core::auth::AdminSession;

use crate::error::AppError;
use crate::routes::live::BEARER_PROTOCOL;
use crate::state::AppState;

/// Admin identity injected into request extensions.
#[derive(Debug, Clone)]
pub struct AdminContext {
    /// The plaintext session token (needed for sign-out).
    pub token: String,
    /// The session it resolved to.
    pub session: AdminSession,
}

/// Middleware that requires a valid admin session.
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return AppError::Unauthorized("missing bearer token".to_owned()).into_response();
    };

    match state.auth.authenticate(&token).await {
        Ok(session) => {
            req.extensions_mut().insert(AdminContext { token, session });
            next.run(req).await
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Session token from the `Authorization` header, or failing that from the
/// WebSocket subprotocol list.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let from_protocol = || {
        let mut offered = headers
            .get(SEC_WEBSOCKET_PROTOCOL)?
            .to_str()
            .ok()?
            .split(',')
            .map(str::trim);
        (offered.next()? == BEARER_PROTOCOL)
            .then(|| offered.next())
            .flatten()
    };

    from_header
        .or_else(from_protocol)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}
