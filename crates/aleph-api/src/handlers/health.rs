//! Health check handler

use crate::state::{AppState, Dispatcher};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(TIMEOUT, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub dispatch: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
}

/// Database and storage reachability. Storage trouble degrades, database
/// trouble fails the check.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let projects = state.projects.clone();
    let database = run_check(
        async move { projects.project_exists(Uuid::nil()).await.map(drop) },
        "unhealthy",
    )
    .await;

    let storage = state.storage.clone();
    let bucket = state.ingest.settings().bucket.clone();
    let storage_status = run_check(
        async move {
            storage
                .exists(&bucket, "health-check-non-existent-key")
                .await
                .map(drop)
        },
        "degraded",
    )
    .await;

    let healthy = database == "healthy";
    if !healthy {
        tracing::error!(database = %database, "Health check failed");
    }

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        database,
        storage: storage_status,
        dispatch: state.dispatcher.mode(),
        queue_capacity: match &state.dispatcher {
            Dispatcher::Inline => None,
            Dispatcher::Queued(queue) => Some(queue.remaining_capacity()),
        },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
