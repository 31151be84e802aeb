//! Admin certificate routes: `/v1/admin/certificates/*`
//!
//! Issue a certificate, list all certificates, or follow the listing live
//! over a WebSocket.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use tracing::info;

use certdesk_core::certificate::{Certificate, IssueRequest, IssuedCertificate};
use certdesk_core::error::CertificateError;

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::middleware::AdminContext;
use crate::routes::live;
use crate::state::AppState;

/// Build the `/v1/admin/certificates` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_certificates).post(issue_certificate))
        .route("/live", get(live_certificates))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CertificateListResponse {
    pub certificates: Vec<Certificate>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Issue a new certificate.
async fn issue_certificate(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminContext>,
    ApiJson(body): ApiJson<IssueRequest>,
) -> Result<(StatusCode, Json<IssuedCertificate>), AppError> {
    let issued = state.certificates.issue(body).await?;
    info!(
        certificate_id = %issued.certificate_id,
        admin = %admin.session.email,
        "certificate issued via API"
    );
    Ok((StatusCode::CREATED, Json(issued)))
}

/// List every certificate, newest first.
async fn list_certificates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CertificateListResponse>, AppError> {
    let certificates = state.certificates.list_all().await?;
    Ok(Json(CertificateListResponse { certificates }))
}

/// Upgrade to a WebSocket that streams the listing on every change.
async fn live_certificates(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    live::upgrade(ws, "certificates", move |tx| {
        state
            .certificates
            .watch_all(live::publish::<Certificate, CertificateError>(tx))
    })
}
