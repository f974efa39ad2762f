//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use aleph_core::Config;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: &Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_tracing(config.log_format());

    tracing::info!(
        production = config.is_production(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(config).await?;
    let storage = storage::setup_storage(config).await?;

    let state = Arc::new(services::initialize_services(config, pool, storage));
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
