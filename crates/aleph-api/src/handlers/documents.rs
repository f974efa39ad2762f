//! Batch upload and document read/delete handlers

use crate::constants::MAX_BATCH_FILES;
use crate::error::HttpAppError;
use crate::state::{AppState, Dispatched};
use aleph_core::models::{
    Document, DocumentResponse, DocumentTextResponse, PageImageResponse,
};
use aleph_core::AppError;
use aleph_services::StagedUpload;
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Multipart field carrying the uploaded files; repeat it for a batch.
const FILES_FIELD: &str = "files";

/// Stage every `files` part and run (or queue) the batch.
///
/// Inline dispatch answers `200 {results, warnings}`; queued dispatch answers
/// `202 {jobs}`. Staged files that never reach the pipeline are removed when
/// the request fails.
#[tracing::instrument(skip_all, fields(project_id = %project_id))]
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    // Nothing is written to disk for a project that does not exist.
    state.ingest.ensure_project(project_id).await?;

    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        if uploads.len() == MAX_BATCH_FILES {
            return Err(AppError::BadRequest(format!(
                "At most {} files can be uploaded at once",
                MAX_BATCH_FILES
            ))
            .into());
        }
        let staged = stage_field(&state, field).await?;
        uploads.push(staged);
    }

    if uploads.is_empty() {
        return Err(AppError::BadRequest(format!(
            "No files provided in the '{}' field",
            FILES_FIELD
        ))
        .into());
    }

    let dispatched = state
        .dispatcher
        .dispatch(&state.ingest, project_id, uploads)
        .await?;

    let status = match dispatched {
        Dispatched::Completed(_) => StatusCode::OK,
        Dispatched::Queued { .. } => StatusCode::ACCEPTED,
    };
    Ok((status, Json(dispatched)).into_response())
}

/// Stream one multipart part to a fresh temp file, enforcing the size limit.
async fn stage_field(state: &AppState, mut field: Field<'_>) -> Result<StagedUpload, HttpAppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let limit = state.upload.max_document_size_bytes;

    let (staged, mut file) = StagedUpload::create(state.ingest.temp_dir(), &file_name).await?;

    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len();
        if written > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "{} exceeds the maximum document size of {} MB",
                staged.original_name(),
                limit / 1024 / 1024
            ))
            .into());
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::debug!(
        file_name = %staged.original_name(),
        size_bytes = written,
        "Upload staged"
    );
    Ok(staged)
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.ingest.ensure_project(project_id).await?;

    let documents = state.documents.list_by_project(project_id).await?;
    let response: Vec<DocumentResponse> =
        documents.into_iter().map(DocumentResponse::from).collect();

    Ok(Json(response))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let document = find_document(&state, id).await?;
    let meta = state.documents.get_meta(id).await?;

    Ok(Json(DocumentResponse::from(document).with_meta(meta)))
}

/// Page images in page order.
pub async fn get_document_pages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    find_document(&state, id).await?;

    let pages: Vec<PageImageResponse> = state
        .documents
        .page_images(id)
        .await?
        .into_iter()
        .map(PageImageResponse::from)
        .collect();

    Ok(Json(pages))
}

pub async fn get_document_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    find_document(&state, id).await?;

    let text = state
        .documents
        .get_text(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document text not found".to_string()))?;

    Ok(Json(DocumentTextResponse::from(text)))
}

/// Storage first, then rows. A storage failure leaves the document in place.
#[tracing::instrument(skip_all, fields(document_id = %id))]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.deletion.delete_document(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_document(state: &AppState, id: Uuid) -> Result<Document, HttpAppError> {
    state
        .documents
        .get_document(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()).into())
}
