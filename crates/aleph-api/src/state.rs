use aleph_core::AppError;
use aleph_services::{
    BatchOutcome, DeletionService, DocumentStore, IngestService, ObjectStorage, ProjectStore,
    StagedUpload,
};
use aleph_worker::{IngestJob, JobQueue};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Upload limits applied while streaming multipart bodies.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_document_size_bytes: usize,
}

/// How accepted batches reach the ingestion pipeline.
pub enum Dispatcher {
    /// Run the pipeline inside the request.
    Inline,
    /// Hand one job per file to the worker pool.
    Queued(JobQueue<IngestJob>),
}

/// Response of a batch upload: per-file outcomes, or the ids of queued jobs.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Dispatched {
    Completed(BatchOutcome),
    Queued { jobs: Vec<Uuid> },
}

impl Dispatcher {
    pub fn mode(&self) -> &'static str {
        match self {
            Dispatcher::Inline => "inline",
            Dispatcher::Queued(_) => "queued",
        }
    }

    /// Run or enqueue a staged batch.
    ///
    /// The project is checked before anything is queued so a missing project
    /// fails the whole batch in both modes. A queued batch is accepted whole or
    /// rejected whole.
    pub async fn dispatch(
        &self,
        ingest: &IngestService,
        project_id: Uuid,
        uploads: Vec<StagedUpload>,
    ) -> Result<Dispatched, AppError> {
        match self {
            Dispatcher::Inline => ingest
                .ingest_batch(project_id, uploads)
                .await
                .map(Dispatched::Completed),
            Dispatcher::Queued(queue) => {
                ingest.ensure_project(project_id).await?;

                let batch: Vec<IngestJob> = uploads
                    .into_iter()
                    .map(|upload| IngestJob::new(project_id, upload))
                    .collect();
                let jobs: Vec<Uuid> = batch.iter().map(|job| job.job_id).collect();
                queue.submit_batch(batch)?;

                tracing::info!(
                    project_id = %project_id,
                    jobs = jobs.len(),
                    "Queued ingest jobs"
                );
                Ok(Dispatched::Queued { jobs })
            }
        }
    }
}

pub struct AppState {
    pub projects: Arc<dyn ProjectStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ingest: IngestService,
    pub deletion: DeletionService,
    pub dispatcher: Dispatcher,
    pub upload: UploadConfig,
}

impl AppState {
    /// Drain the worker pool, if any, once the server has stopped.
    pub async fn shutdown(self) {
        if let Dispatcher::Queued(queue) = self.dispatcher {
            tracing::info!("Draining ingest queue");
            queue.shutdown().await;
        }
    }
}
