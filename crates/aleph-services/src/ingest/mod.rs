//! Document ingestion
//!
//! [`IngestService::process`] drives one staged file through the pipeline
//! state machine ([`IngestState`]); [`IngestService::ingest_batch`] runs it for
//! every file of a batch after checking the project exists. Inline and queued
//! dispatch both end up in `process`.
//!
//! Ordering guarantees per file: extraction finishes before the checksum and
//! upload, the upload before any row is written, and rows before page
//! rasterization. The staged file is removed on every exit path.

mod outcome;
mod pages;
mod staging;
mod state;

pub use outcome::{BatchOutcome, FileOutcome, FileReport};
pub use staging::StagedUpload;
pub use state::IngestState;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aleph_core::models::{FileMetadata, NewDocument};
use aleph_core::{AppError, Config, NoOpSearchIndexer, SearchDocument, SearchIndexer};
use aleph_db::{DocumentStore, ProjectStore};
use aleph_processing::{
    extract_emails, file_checksum, file_metadata, unique_key, ExtractionOutcome, PageRenderer,
    TextExtractor,
};
use aleph_storage::ObjectStorage;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use state::StateTrail;

/// Files of one batch processed at the same time.
const BATCH_CONCURRENCY: usize = 4;

/// Where ingested objects go and where uploads are staged.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub bucket: String,
    pub temp_dir: PathBuf,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bucket: config.document_bucket().to_string(),
            temp_dir: config.upload_temp_dir().to_path_buf(),
        }
    }
}

/// Checksum and filesystem facts gathered before upload.
struct Fingerprint {
    checksum: String,
    metadata: FileMetadata,
}

#[derive(Clone)]
pub struct IngestService {
    projects: Arc<dyn ProjectStore>,
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    extractor: Arc<dyn TextExtractor>,
    renderer: Arc<dyn PageRenderer>,
    indexer: Arc<dyn SearchIndexer>,
    settings: IngestSettings,
}

impl IngestService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        documents: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        extractor: Arc<dyn TextExtractor>,
        renderer: Arc<dyn PageRenderer>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            projects,
            documents,
            storage,
            extractor,
            renderer,
            indexer: Arc::new(NoOpSearchIndexer),
            settings,
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn SearchIndexer>) -> Self {
        self.indexer = indexer;
        self
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Directory uploads should be staged under.
    pub fn temp_dir(&self) -> &Path {
        &self.settings.temp_dir
    }

    /// Fail with `NotFound` unless the project exists.
    pub async fn ensure_project(&self, project_id: Uuid) -> Result<(), AppError> {
        if self.projects.project_exists(project_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Project not found".to_string()))
        }
    }

    /// Run every file of a batch through the pipeline.
    ///
    /// The project is checked once, before any file is touched; a missing
    /// project fails the whole batch. After that, one file's failure never
    /// affects its siblings. Reports come back in submission order.
    #[tracing::instrument(skip(self, uploads), fields(project_id = %project_id, files = uploads.len()))]
    pub async fn ingest_batch(
        &self,
        project_id: Uuid,
        uploads: Vec<StagedUpload>,
    ) -> Result<BatchOutcome, AppError> {
        // Uploads are dropped (and their temp files removed) on early return.
        self.ensure_project(project_id).await?;

        let reports: Vec<FileReport> = stream::iter(uploads)
            .map(|upload| self.process(project_id, upload))
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;

        Ok(BatchOutcome::from_reports(reports))
    }

    /// Drive one staged file to a terminal state and clean up after it.
    pub async fn process(&self, project_id: Uuid, mut upload: StagedUpload) -> FileReport {
        let start = std::time::Instant::now();
        let file_name = upload.original_name().to_string();
        let mut trail = StateTrail::staged(&file_name);
        let mut warnings = Vec::new();

        let outcome = self
            .run(project_id, &upload, &mut trail, &mut warnings)
            .await;
        let decided = trail.current();

        if let Err(e) = upload.cleanup() {
            tracing::warn!(file_name = %file_name, error = %e, "Failed to remove staged upload");
        }
        trail.advance(IngestState::Cleaned);

        match &outcome {
            FileOutcome::Ingested { document_id } => tracing::info!(
                project_id = %project_id,
                document_id = %document_id,
                file_name = %file_name,
                warnings = warnings.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Document ingested"
            ),
            FileOutcome::Failed { error } => tracing::warn!(
                project_id = %project_id,
                file_name = %file_name,
                state = %decided,
                error = %error,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Document ingestion failed"
            ),
        }

        FileReport {
            file_name,
            outcome,
            warnings,
            states: trail.into_states(),
        }
    }

    async fn run(
        &self,
        project_id: Uuid,
        upload: &StagedUpload,
        trail: &mut StateTrail,
        warnings: &mut Vec<String>,
    ) -> FileOutcome {
        let path = upload.path();
        let name = upload.original_name();
        let bucket = &self.settings.bucket;

        // LOCAL_WRITTEN -> EXTRACTED
        let extraction = self.extractor.extract(path).await;
        let paginated = extraction.format.is_paginated();
        let text = match extraction.outcome {
            ExtractionOutcome::Text(text) => text,
            ExtractionOutcome::Failed(error) => {
                trail.advance(IngestState::ExtractionFailed);
                return FileOutcome::Failed { error };
            }
        };
        warnings.extend(extraction.warnings);
        let emails = extract_emails(&text);
        trail.advance(IngestState::Extracted);

        // EXTRACTED -> UPLOADED
        let fingerprint = match fingerprint(path, name).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                trail.advance(IngestState::UploadFailed);
                return FileOutcome::Failed {
                    error: format!("Error reading uploaded file: {}", e),
                };
            }
        };

        if self.is_known_hash(&fingerprint.checksum).await {
            trail.advance(IngestState::Duplicate);
            return FileOutcome::Failed {
                error: duplicate_message(name),
            };
        }

        let key = unique_key(&fingerprint.checksum, Utc::now().timestamp());
        if let Err(e) = self.storage.upload(path, bucket, &key).await {
            trail.advance(IngestState::UploadFailed);
            return FileOutcome::Failed {
                error: format!("Error uploading file to storage: {}", e),
            };
        }
        trail.advance(IngestState::Uploaded);

        // UPLOADED -> PERSISTED
        let new_document = NewDocument {
            id: Uuid::new_v4(),
            project_id,
            storage_key: key.clone(),
            file_name: name.to_string(),
            file_url: self.storage.url(bucket, &key),
            hash_value: fingerprint.checksum,
            metadata: fingerprint.metadata,
            text,
            emails,
        };

        let document = match self.documents.create_document(&new_document).await {
            Ok(document) => document,
            Err(e) => {
                self.rollback_upload(&key).await;
                let error = if e.is_duplicate() {
                    trail.advance(IngestState::Duplicate);
                    duplicate_message(name)
                } else {
                    trail.advance(IngestState::PersistFailed);
                    format!("Error saving document: {}", e)
                };
                return FileOutcome::Failed { error };
            }
        };
        trail.advance(IngestState::Persisted);

        self.index(&new_document).await;

        // PERSISTED -> RASTERIZED, only when at least one page was recorded
        if paginated && self.rasterize(path, &key, document.id, warnings).await > 0 {
            trail.advance(IngestState::Rasterized);
        }

        FileOutcome::Ingested {
            document_id: document.id,
        }
    }

    /// Pre-upload dedup check. The unique index on `hash_value` stays the
    /// backstop, so a failed lookup only logs.
    async fn is_known_hash(&self, checksum: &str) -> bool {
        match self.documents.hash_exists(checksum).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, "Duplicate lookup failed, relying on unique index");
                false
            }
        }
    }

    /// Remove an object whose rows could not be written.
    async fn rollback_upload(&self, key: &str) {
        let bucket = &self.settings.bucket;
        match self.storage.delete(bucket, key).await {
            Ok(()) => tracing::info!(bucket = %bucket, key = %key, "Rolled back uploaded object"),
            Err(e) => tracing::error!(
                bucket = %bucket,
                key = %key,
                error = %e,
                "Failed to roll back uploaded object; it is now orphaned"
            ),
        }
    }

    async fn index(&self, document: &NewDocument) {
        let payload = SearchDocument {
            document_id: document.id,
            project_id: document.project_id,
            file_name: document.file_name.clone(),
            file_url: document.file_url.clone(),
            text: document.text.clone(),
            emails: document.emails.clone(),
        };
        if let Err(e) = self.indexer.index_document(payload).await {
            tracing::warn!(document_id = %document.id, error = %e, "Search indexing failed");
        }
    }
}

async fn fingerprint(path: &Path, name: &str) -> std::io::Result<Fingerprint> {
    let checksum = file_checksum(path, name).await?;
    let metadata = file_metadata(path, name).await?;
    Ok(Fingerprint { checksum, metadata })
}

fn duplicate_message(name: &str) -> String {
    format!("Duplicate document: {} has already been ingested", name)
}

#[cfg(test)]
mod tests;
