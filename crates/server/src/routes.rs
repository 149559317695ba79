//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Maximum accepted artifact upload size (4 GiB).
const MAX_BODY_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/push", post(handlers::push))
        .route("/pull", post(handlers::pull))
        .route("/templates", get(handlers::list_templates))
        .route("/versions", get(handlers::list_versions))
        .route(
            "/versions/{template_id}/{version}",
            get(handlers::get_version),
        )
        .route("/jobs", get(handlers::list_jobs))
        // Health check is unauthenticated for load balancers/probes.
        .route("/health", get(handlers::health_check));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
