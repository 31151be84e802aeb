//! Admin authentication routes: `/v1/auth/*`
//!
//! Sign-in (password or email link) is public; session lookup and sign-out
//! require a valid bearer token.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use certdesk_core::auth::{AdminSession, SignedIn};

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::middleware::AdminContext;
use crate::state::AppState;

/// Build the public sign-in routes. Merged at the root because the
/// session routes share the `/v1/auth` prefix under a different layer.
pub fn login_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/link", post(request_link))
        .route("/v1/auth/link/{token}", post(consume_link))
}

/// Build the authenticated session routes, merged at the root.
pub fn session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/auth/session", get(current_session))
        .route("/v1/auth/logout", post(logout))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Present only when the session was just created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub email: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub message: &'static str,
}

impl SessionResponse {
    fn new(token: Option<String>, session: AdminSession) -> Self {
        Self {
            token,
            email: session.email,
            expires_at: rfc3339(session.expires_at),
        }
    }
}

impl From<SignedIn> for SessionResponse {
    fn from(signed_in: SignedIn) -> Self {
        Self::new(Some(signed_in.token), signed_in.session)
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Sign in with email and password.
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let signed_in = state.auth.sign_in(&body.email, &body.password).await?;
    Ok(Json(signed_in.into()))
}

/// Send a sign-in link to the admin email.
async fn request_link(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    state.auth.request_link(&body.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(LinkResponse {
            message: "sign-in link sent",
        }),
    ))
}

/// Exchange a sign-in link token for a session.
async fn consume_link(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let signed_in = state.auth.consume_link(&token).await?;
    Ok(Json(signed_in.into()))
}

/// The session behind the bearer token.
async fn current_session(
    Extension(admin): Extension<AdminContext>,
) -> Json<SessionResponse> {
    Json(SessionResponse::new(None, admin.session))
}

/// End the session behind the bearer token.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminContext>,
) -> Result<StatusCode, AppError> {
    state.auth.sign_out(&admin.token).await?;
    Ok(StatusCode::NO_CONTENT)
}
