//! `CertDesk` HTTP server.
//!
//! Wires together the core library, storage backend, and HTTP routes into a
//! running Axum server. Serves the JSON API at `/v1/*`, the public contact
//! endpoint at `/api/contact`, and rendered verification pages at
//! `/certificates/{code}`.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::middleware as axum_mw;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::admin_middleware;
use crate::state::AppState;

/// Maximum concurrent sign-in requests.
const SIGN_IN_CONCURRENCY: usize = 10;

/// Build the Axum router with all routes and middleware.
pub fn app(state: Arc<AppState>) -> Router {
    // Admin routes go through the bearer-token middleware.
    let admin_routes = Router::new()
        .nest("/v1/admin/certificates", routes::certificates::router())
        .nest("/v1/admin/projects", routes::projects::admin_router())
        .nest("/v1/admin/testimonials", routes::testimonials::admin_router())
        .nest("/v1/admin/submissions", routes::submissions::admin_router())
        .merge(routes::auth::session_router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            admin_middleware,
        ));

    // Concurrency-limit sign-in to blunt password guessing.
    let login_routes = routes::auth::login_router()
        .layer(tower::limit::ConcurrencyLimitLayer::new(SIGN_IN_CONCURRENCY));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    Router::new()
        .nest("/v1/health", routes::health::router())
        .nest("/certificates", routes::verify::page_router())
        .nest("/v1/certificates", routes::verify::api_router())
        .nest("/v1/projects", routes::projects::public_router())
        .nest("/v1/testimonials", routes::testimonials::public_router())
        .nest("/api/contact", routes::submissions::contact_router())
        .merge(login_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
