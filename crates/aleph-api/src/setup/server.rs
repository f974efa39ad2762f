//! Server startup and graceful shutdown

use crate::state::AppState;
use aleph_core::Config;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;

/// Serve until a shutdown signal arrives, then drain the ingest queue.
pub async fn start_server(config: &Config, state: Arc<AppState>, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_document_mb = config.max_document_size_bytes() / 1024 / 1024,
        dispatch = state.dispatcher.mode(),
        bucket = %config.document_bucket(),
        pdftoppm_path = %config.tools().pdftoppm_path,
        tesseract_path = %config.tools().tesseract_path,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router and every connection are gone once serve returns.
    match Arc::try_unwrap(state) {
        Ok(state) => state.shutdown().await,
        Err(_) => tracing::warn!("Application state still shared; ingest queue not drained"),
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM.
///
/// # Panics
/// Panics if a signal handler cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
