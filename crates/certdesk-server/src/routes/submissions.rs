//! Contact routes: public `POST /api/contact` and admin
//! `/v1/admin/submissions/*`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use certdesk_core::error::CatalogError;
use certdesk_core::submission::{ContactForm, Submission};

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::routes::live;
use crate::state::AppState;

/// Build the `/api/contact` router.
pub fn contact_router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(submit_contact))
}

/// Build the `/v1/admin/submissions` router.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_submissions))
        .route("/live", get(live_submissions))
        .route("/{id}", delete(delete_submission))
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionListResponse {
    pub submissions: Vec<Submission>,
}

/// Store a contact form submission.
async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ContactForm>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let submission = state.submissions.submit(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            message: "Message received. We will get back to you soon.",
            id: submission.id,
        }),
    ))
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SubmissionListResponse>, AppError> {
    let submissions = state.submissions.list_all().await?;
    Ok(Json(SubmissionListResponse { submissions }))
}

async fn delete_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.submissions.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upgrade to a WebSocket that streams the full listing on every change.
async fn live_submissions(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    live::upgrade(ws, "submissions", move |tx| {
        state
            .submissions
            .watch_all(live::publish::<Submission, CatalogError>(tx))
    })
}
