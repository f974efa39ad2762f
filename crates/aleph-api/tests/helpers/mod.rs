//! Test helpers: build AppState and router over in-memory collaborators.
//!
//! Run from workspace root: `cargo test -p aleph-api`. No database or object
//! store is needed.

#![allow(dead_code)]

use aleph_api::setup::routes;
use aleph_api::{AppState, Dispatcher, UploadConfig};
use aleph_processing::classifier::DocumentFormat;
use aleph_services::testing::{Harness, ScriptedExtractor, ScriptedRenderer};
use aleph_worker::{IngestJob, IngestJobHandler, JobQueue, JobQueueConfig};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Test application: server plus the in-memory collaborators behind it.
pub struct TestApp {
    pub server: TestServer,
    pub harness: Harness,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub struct AppBuilder {
    harness: Harness,
    extractor: ScriptedExtractor,
    renderer: ScriptedRenderer,
    queue: Option<JobQueueConfig>,
    max_document_size_bytes: usize,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            harness: Harness::new(),
            extractor: ScriptedExtractor::text(
                DocumentFormat::PlainText,
                "contact a@b.com, a@b.com or c@d.org",
            ),
            renderer: ScriptedRenderer::pages(0),
            queue: None,
            max_document_size_bytes: MAX_DOCUMENT_SIZE,
        }
    }

    pub fn extractor(mut self, extractor: ScriptedExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn renderer(mut self, renderer: ScriptedRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn queued(self) -> Self {
        self.queue_config(JobQueueConfig::default())
    }

    pub fn queue_config(mut self, config: JobQueueConfig) -> Self {
        self.queue = Some(config);
        self
    }

    pub fn max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size_bytes = bytes;
        self
    }

    pub fn build(self) -> TestApp {
        let harness = self.harness;
        let ingest = harness.ingest_service(self.extractor, self.renderer);

        let dispatcher = match self.queue {
            Some(config) => Dispatcher::Queued(JobQueue::<IngestJob>::new(
                Arc::new(IngestJobHandler::new(ingest.clone())),
                config,
            )),
            None => Dispatcher::Inline,
        };

        let state = AppState {
            projects: harness.store.clone(),
            documents: harness.store.clone(),
            storage: harness.storage.clone(),
            ingest,
            deletion: harness.deletion_service(),
            dispatcher,
            upload: UploadConfig {
                max_document_size_bytes: self.max_document_size_bytes,
            },
        };

        let router = routes::setup_routes(Arc::new(state));
        let server = TestServer::new(router).expect("test server");

        TestApp { server, harness }
    }
}

/// Inline app that extracts plain text with three email addresses.
pub fn setup_test_app() -> TestApp {
    AppBuilder::new().build()
}

/// Multipart form with one `files` part per (name, body).
pub fn files_form(files: &[(&str, &[u8])]) -> MultipartForm {
    files.iter().fold(MultipartForm::new(), |form, (name, body)| {
        form.add_part(
            "files",
            Part::bytes(body.to_vec())
                .file_name(name.to_string())
                .mime_type("application/octet-stream"),
        )
    })
}

/// Wait for a condition with timeout.
pub async fn wait_for_condition<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
