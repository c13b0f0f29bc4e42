use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{collection, handlers, jobs, middleware::metrics_middleware, orchestrator};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health, config and metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/approve", post(jobs::approve_job))
        .route("/jobs/{id}/identify", post(jobs::identify_job))
        .route("/jobs/{id}/pre-identify", post(jobs::pre_identify_job))
        .route("/jobs/{id}/skip", post(jobs::skip_job))
        .route("/jobs/{id}/archive", post(jobs::archive_job))
        // Operator mode
        .route("/mode", get(jobs::get_mode).put(jobs::set_mode))
        // Collection log
        .route("/collection", get(collection::list_collection))
        // Orchestrator and oversight
        .route("/orchestrator/status", get(orchestrator::get_status))
        .route("/oversight/check", get(orchestrator::check))
        .route("/oversight/fix-encoding", post(orchestrator::fix_encoding))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
