//! Storage setup and initialization

use aleph_core::Config;
use aleph_storage::{create_storage, ObjectStorage};
use anyhow::{Context, Result};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    tracing::info!("Initializing object storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize object storage")?;
    tracing::info!(
        backend = ?storage.backend_type(),
        bucket = %config.document_bucket(),
        "Object storage initialized successfully"
    );
    Ok(storage)
}
