//! Testimonial routes: public `/v1/testimonials` and admin
//! `/v1/admin/testimonials/*`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;

use certdesk_core::error::CatalogError;
use certdesk_core::testimonial::{Testimonial, TestimonialInput};

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::routes::live;
use crate::state::AppState;

/// Build the public `/v1/testimonials` router.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_approved))
}

/// Build the `/v1/admin/testimonials` router.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_all).post(create_testimonial))
        .route("/live", get(live_testimonials))
        .route("/{id}", put(update_testimonial).delete(delete_testimonial))
}

#[derive(Debug, Serialize)]
pub struct TestimonialListResponse {
    pub testimonials: Vec<Testimonial>,
}

/// Approved testimonials only.
async fn list_approved(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TestimonialListResponse>, AppError> {
    let testimonials = state.testimonials.list_approved().await?;
    Ok(Json(TestimonialListResponse { testimonials }))
}

async fn list_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TestimonialListResponse>, AppError> {
    let testimonials = state.testimonials.list_all().await?;
    Ok(Json(TestimonialListResponse { testimonials }))
}

async fn create_testimonial(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<TestimonialInput>,
) -> Result<(StatusCode, Json<Testimonial>), AppError> {
    let testimonial = state.testimonials.create(body).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

async fn update_testimonial(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<TestimonialInput>,
) -> Result<Json<Testimonial>, AppError> {
    Ok(Json(state.testimonials.update(&id, body).await?))
}

async fn delete_testimonial(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.testimonials.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upgrade to a WebSocket that streams the full listing on every change.
async fn live_testimonials(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    live::upgrade(ws, "testimonials", move |tx| {
        state
            .testimonials
            .watch_all(live::publish::<Testimonial, CatalogError>(tx))
    })
}
