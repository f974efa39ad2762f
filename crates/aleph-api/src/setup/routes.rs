//! Route configuration and setup

use crate::constants::{API_PREFIX, MAX_BATCH_FILES};
use crate::handlers::{documents, health, projects};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn setup_routes(state: Arc<AppState>) -> Router {
    // A full batch plus room for multipart framing.
    let body_limit = state
        .upload
        .max_document_size_bytes
        .saturating_mul(MAX_BATCH_FILES)
        .saturating_add(64 * 1024);

    Router::new()
        .route("/health", get(health::health_check))
        .nest(API_PREFIX, api_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/projects",
            post(projects::create_project).get(projects::list_projects),
        )
        .route(
            "/projects/{project_id}",
            get(projects::get_project).delete(projects::delete_project),
        )
        .route(
            "/projects/{project_id}/documents",
            post(documents::upload_documents).get(documents::list_documents),
        )
        .route(
            "/documents/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/{id}/pages", get(documents::get_document_pages))
        .route("/documents/{id}/text", get(documents::get_document_text))
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}
