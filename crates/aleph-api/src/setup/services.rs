//! Service initialization and application state setup

use crate::state::{AppState, Dispatcher, UploadConfig};
use aleph_core::{Config, DispatchMode};
use aleph_db::{DocumentRepository, ProjectRepository};
use aleph_processing::{FileExtractor, PdftoppmRenderer};
use aleph_services::{DeletionService, IngestService, IngestSettings, ObjectStorage};
use aleph_worker::{IngestJob, IngestJobHandler, JobQueue, JobQueueConfig};
use sqlx::PgPool;
use std::sync::Arc;

/// Wire repositories, processors and services into the application state.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
) -> AppState {
    let projects = Arc::new(ProjectRepository::new(pool.clone()));
    let documents = Arc::new(DocumentRepository::new(pool));

    let tools = config.tools();
    let extractor = Arc::new(FileExtractor::from_tools(tools));
    let renderer = Arc::new(PdftoppmRenderer::new(tools.pdftoppm_path.clone()));

    let ingest = IngestService::new(
        projects.clone(),
        documents.clone(),
        storage.clone(),
        extractor,
        renderer,
        IngestSettings::from_config(config),
    );
    let deletion = DeletionService::new(
        projects.clone(),
        documents.clone(),
        storage.clone(),
        config.document_bucket(),
    );

    let dispatcher = match config.dispatch_mode() {
        DispatchMode::Inline => Dispatcher::Inline,
        DispatchMode::Queued => Dispatcher::Queued(JobQueue::<IngestJob>::new(
            Arc::new(IngestJobHandler::new(ingest.clone())),
            JobQueueConfig::from_config(config),
        )),
    };
    tracing::info!(dispatch = dispatcher.mode(), "Ingest dispatch configured");

    AppState {
        projects,
        documents,
        storage,
        ingest,
        deletion,
        dispatcher,
        upload: UploadConfig {
            max_document_size_bytes: config.max_document_size_bytes(),
        },
    }
}
