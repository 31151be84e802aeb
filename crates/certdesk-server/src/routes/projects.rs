//! Project routes: public `/v1/projects/*` and admin `/v1/admin/projects/*`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use certdesk_core::error::CatalogError;
use certdesk_core::project::{Project, ProjectInput};

use crate::error::AppError;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::live;
use crate::state::AppState;

/// Build the public `/v1/projects` router.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_projects))
        .route("/{id}", get(get_project))
}

/// Build the `/v1/admin/projects` router.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_all_projects).post(create_project))
        .route("/live", get(live_projects))
        .route(
            "/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListProjectsParams {
    /// Only featured projects when `true`.
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Public portfolio listing.
async fn list_projects(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListProjectsParams>,
) -> Result<Json<ProjectListResponse>, AppError> {
    let projects = if params.featured {
        state.projects.list_featured().await?
    } else {
        state.projects.list_all().await?
    };
    Ok(Json(ProjectListResponse { projects }))
}

/// Every project, for the admin.
async fn list_all_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProjectListResponse>, AppError> {
    let projects = state.projects.list_all().await?;
    Ok(Json(ProjectListResponse { projects }))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.projects.get(&id).await?))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ProjectInput>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = state.projects.create(body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProjectInput>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.projects.update(&id, body).await?))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.projects.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upgrade to a WebSocket that streams the full listing on every change.
async fn live_projects(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    live::upgrade(ws, "projects", move |tx| {
        state
            .projects
            .watch_all(live::publish::<Project, CatalogError>(tx))
    })
}
