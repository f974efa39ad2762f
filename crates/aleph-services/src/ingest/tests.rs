use aleph_core::AppError;
use aleph_processing::classifier::DocumentFormat;
use aleph_processing::FileExtractor;

use super::*;
use crate::testing::{Harness, ScriptedExtractor, ScriptedRenderer};

use IngestState::*;

fn text_extractor(text: &str) -> ScriptedExtractor {
    ScriptedExtractor::text(DocumentFormat::PlainText, text)
}

#[tokio::test]
async fn text_file_runs_the_happy_path() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(
        text_extractor("write to a@b.com, a@b.com or c@d.org"),
        ScriptedRenderer::pages(0),
    );

    let upload = harness.stage("notes.txt", b"ignored by the scripted extractor").await;
    let report = service.process(project_id, upload).await;

    let document_id = report.document_id().expect("ingested");
    assert_eq!(
        report.states,
        vec![Received, LocalWritten, Extracted, Uploaded, Persisted, Cleaned]
    );
    assert!(report.warnings.is_empty());

    let text = harness.store.text_of(document_id).unwrap();
    assert_eq!(text.emails, vec!["a@b.com", "a@b.com", "c@d.org"]);

    let meta = harness.store.meta_of(document_id).unwrap();
    assert_eq!(meta.name, "notes.txt");
    assert_eq!(meta.file_type, "text/plain");
    assert_eq!(meta.hash_value.len(), 64);

    let keys = harness.storage.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with(&meta.hash_value));

    assert_eq!(harness.staged_file_count(), 0);
    let indexed = harness.indexer.indexed();
    assert_eq!(indexed.len(), 1);
    assert_eq!(indexed[0].document_id, document_id);
    assert_eq!(indexed[0].emails.len(), 3);
}

#[tokio::test]
async fn failed_page_is_skipped_with_a_warning() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(
        ScriptedExtractor::text(DocumentFormat::Pdf, "page text"),
        ScriptedRenderer::pages(3).failing_on(2),
    );

    let upload = harness.stage("scan.pdf", b"%PDF-1.7").await;
    let report = service.process(project_id, upload).await;

    let document_id = report.document_id().expect("document persisted");
    assert_eq!(harness.store.page_numbers(document_id), vec![1, 3]);
    assert_eq!(harness.store.text_of(document_id).unwrap().text, "page text");
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("page 2"));
    assert_eq!(
        report.states,
        vec![Received, LocalWritten, Extracted, Uploaded, Persisted, Rasterized, Cleaned]
    );
    // document object plus two page images
    assert_eq!(harness.storage.object_count(), 3);
}

#[tokio::test]
async fn page_upload_failure_is_not_fatal() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    harness.storage.fail_upload_for("_page_2.jpg");
    let service = harness.ingest_service(
        ScriptedExtractor::text(DocumentFormat::Pdf, ""),
        ScriptedRenderer::pages(3),
    );

    let upload = harness.stage("scan.pdf", b"%PDF-1.7").await;
    let report = service.process(project_id, upload).await;

    let document_id = report.document_id().unwrap();
    assert_eq!(harness.store.page_numbers(document_id), vec![1, 3]);
    assert_eq!(report.warnings.len(), 1);
}

#[tokio::test]
async fn unreadable_pdf_keeps_the_document() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(
        ScriptedExtractor::text(DocumentFormat::Pdf, "text layer"),
        ScriptedRenderer::unreadable(),
    );

    let upload = harness.stage("broken.pdf", b"%PDF-1.7").await;
    let report = service.process(project_id, upload).await;

    let document_id = report.document_id().unwrap();
    assert!(harness.store.page_numbers(document_id).is_empty());
    assert!(report.warnings[0].starts_with("Error rasterizing document"));
    assert_eq!(
        report.states,
        vec![Received, LocalWritten, Extracted, Uploaded, Persisted, Cleaned]
    );
}

#[tokio::test]
async fn no_rendered_page_means_no_rasterized_state() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(
        ScriptedExtractor::text(DocumentFormat::Pdf, "text layer"),
        ScriptedRenderer::pages(1).failing_on(1),
    );

    let upload = harness.stage("single.pdf", b"%PDF-1.7").await;
    let report = service.process(project_id, upload).await;

    assert!(report.document_id().is_some());
    assert_eq!(report.warnings.len(), 1);
    assert!(!report.states.contains(&Rasterized));
}

#[tokio::test]
async fn extraction_warnings_reach_the_report() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(
        ScriptedExtractor::text(DocumentFormat::Pdf, "text layer")
            .with_warning("Embedded image 1 on page 1 could not be read: unsupported filter JBIG2Decode"),
        ScriptedRenderer::pages(1),
    );

    let upload = harness.stage("fax.pdf", b"%PDF-1.7").await;
    let report = service.process(project_id, upload).await;

    assert!(report.document_id().is_some());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("JBIG2Decode"));
    assert!(report.states.contains(&Rasterized));
}

#[tokio::test]
async fn upload_failure_leaves_no_rows_and_no_temp_file() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    harness.storage.fail_uploads(true);
    let service = harness.ingest_service(text_extractor("hello"), ScriptedRenderer::pages(0));

    let upload = harness.stage("notes.txt", b"hello").await;
    let staged_path = upload.path().to_path_buf();
    let report = service.process(project_id, upload).await;

    assert!(report
        .error()
        .unwrap()
        .starts_with("Error uploading file to storage"));
    assert_eq!(report.terminal_state(), Some(UploadFailed));
    assert_eq!(report.final_state(), Some(Cleaned));
    assert_eq!(harness.store.document_count(), 0);
    assert_eq!(harness.store.meta_count(), 0);
    assert_eq!(harness.store.text_count(), 0);
    assert!(!staged_path.exists());
    assert_eq!(harness.staged_file_count(), 0);
}

#[tokio::test]
async fn extraction_failure_skips_upload() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(
        ScriptedExtractor::failure(
            DocumentFormat::Doc,
            "Error extracting text from file: antiword failed: not a Word document",
        ),
        ScriptedRenderer::pages(0),
    );

    let upload = harness.stage("memo.doc", b"garbage").await;
    let report = service.process(project_id, upload).await;

    assert_eq!(
        report.states,
        vec![Received, LocalWritten, ExtractionFailed, Cleaned]
    );
    assert!(report.error().unwrap().contains("antiword failed"));
    assert_eq!(harness.storage.object_count(), 0);
    assert_eq!(harness.store.document_count(), 0);
    assert_eq!(harness.staged_file_count(), 0);
}

#[tokio::test]
async fn persist_failure_rolls_back_the_upload() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    harness.store.fail_create_document(true);
    let service = harness.ingest_service(text_extractor("hello"), ScriptedRenderer::pages(0));

    let upload = harness.stage("notes.txt", b"hello").await;
    let report = service.process(project_id, upload).await;

    assert_eq!(report.terminal_state(), Some(PersistFailed));
    assert!(report.error().unwrap().starts_with("Error saving document"));
    assert_eq!(harness.storage.object_count(), 0);
    assert_eq!(harness.staged_file_count(), 0);
}

#[tokio::test]
async fn same_bytes_and_name_is_a_duplicate() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(text_extractor("hello"), ScriptedRenderer::pages(0));

    let first = service
        .process(project_id, harness.stage("notes.txt", b"hello").await)
        .await;
    let second = service
        .process(project_id, harness.stage("notes.txt", b"hello").await)
        .await;
    let renamed = service
        .process(project_id, harness.stage("notes-copy.txt", b"hello").await)
        .await;

    assert!(first.document_id().is_some());
    assert_eq!(second.terminal_state(), Some(Duplicate));
    assert!(second.error().unwrap().starts_with("Duplicate document"));
    assert!(renamed.document_id().is_some());
    assert_eq!(harness.store.document_count(), 2);
    assert_eq!(harness.storage.object_count(), 2);
}

#[tokio::test]
async fn missing_project_fails_the_whole_batch() {
    let harness = Harness::new();
    let service = harness.ingest_service(text_extractor("hello"), ScriptedRenderer::pages(0));

    let uploads = vec![
        harness.stage("a.txt", b"a").await,
        harness.stage("b.txt", b"b").await,
    ];
    let err = service
        .ingest_batch(Uuid::new_v4(), uploads)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Project not found"));
    assert_eq!(harness.storage.object_count(), 0);
    assert_eq!(harness.staged_file_count(), 0);
}

#[tokio::test]
async fn one_bad_file_does_not_abort_its_siblings() {
    let harness = Harness::new();
    let project_id = harness.store.add_project("acme");
    let service = harness.ingest_service(FileExtractor::default(), ScriptedRenderer::pages(0));

    let uploads = vec![
        harness.stage("a.txt", b"reach me at ops@example.com").await,
        harness.stage("b.bin", &[0x00, 0x01, 0xFE, 0xFF, 0x00, 0x10]).await,
        harness.stage("c.csv", b"a,b\nc,d\n").await,
    ];
    let batch = service.ingest_batch(project_id, uploads).await.unwrap();

    let names: Vec<&str> = batch.results.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.bin", "c.csv"]);

    let first = batch.results[0].document_id().unwrap();
    assert_eq!(
        harness.store.text_of(first).unwrap().emails,
        vec!["ops@example.com"]
    );
    assert!(batch.results[1]
        .error()
        .unwrap()
        .starts_with("Unsupported file type"));
    let third = batch.results[2].document_id().unwrap();
    assert_eq!(harness.store.text_of(third).unwrap().text, "a,b\nc,d");

    assert_eq!(harness.store.document_count(), 2);
    assert!(batch.warnings.is_empty());
    assert_eq!(harness.staged_file_count(), 0);
}
