//! Queued ingestion: one job per staged file.

use aleph_services::{IngestService, StagedUpload};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::context::JobHandler;

/// A staged upload waiting to go through the ingestion pipeline.
///
/// The project was checked when the batch was accepted.
#[derive(Debug)]
pub struct IngestJob {
    pub job_id: Uuid,
    pub project_id: Uuid,
    pub upload: StagedUpload,
}

impl IngestJob {
    pub fn new(project_id: Uuid, upload: StagedUpload) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            project_id,
            upload,
        }
    }
}

/// Runs [`IngestJob`]s through the same pipeline inline mode uses.
pub struct IngestJobHandler {
    service: IngestService,
}

impl IngestJobHandler {
    pub fn new(service: IngestService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler<IngestJob> for IngestJobHandler {
    fn job_type(&self) -> &'static str {
        "ingest"
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.job_id, project_id = %job.project_id))]
    async fn handle(&self, job: IngestJob) -> Result<()> {
        let report = self.service.process(job.project_id, job.upload).await;

        for warning in &report.warnings {
            tracing::warn!(file_name = %report.file_name, warning = %warning, "Ingest warning");
        }

        match report.error() {
            None => Ok(()),
            Some(error) => Err(anyhow::anyhow!(
                "ingest of {} failed: {}",
                report.file_name,
                error
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{JobQueue, JobQueueConfig};
    use aleph_processing::classifier::DocumentFormat;
    use aleph_services::testing::{Harness, ScriptedExtractor, ScriptedRenderer};
    use std::sync::Arc;

    #[tokio::test]
    async fn queued_jobs_run_the_pipeline() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        let service = harness.ingest_service(
            ScriptedExtractor::text(DocumentFormat::Pdf, "contract"),
            ScriptedRenderer::pages(2),
        );
        let queue = JobQueue::<IngestJob>::new(
            Arc::new(IngestJobHandler::new(service)),
            JobQueueConfig::default(),
        );

        queue
            .submit_batch(vec![
                IngestJob::new(project_id, harness.stage("a.pdf", b"%PDF-a").await),
                IngestJob::new(project_id, harness.stage("b.pdf", b"%PDF-b").await),
            ])
            .unwrap();
        queue.shutdown().await;

        assert_eq!(harness.store.document_count(), 2);
        // two documents, two pages each
        assert_eq!(harness.storage.object_count(), 6);
        assert_eq!(harness.staged_file_count(), 0);
    }

    #[tokio::test]
    async fn failed_ingest_is_reported_as_job_error() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        harness.storage.fail_uploads(true);
        let handler = IngestJobHandler::new(harness.ingest_service(
            ScriptedExtractor::text(DocumentFormat::PlainText, "x"),
            ScriptedRenderer::pages(0),
        ));

        let err = handler
            .handle(IngestJob::new(project_id, harness.stage("a.txt", b"x").await))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Error uploading file to storage"));
    }
}
