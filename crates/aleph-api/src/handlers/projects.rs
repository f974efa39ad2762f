use crate::error::HttpAppError;
use crate::state::AppState;
use aleph_core::models::CreateProjectRequest;
use aleph_core::AppError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Project name must not be empty".to_string()).into());
    }

    let project = state
        .projects
        .create_project(name.to_string(), request.description)
        .await?;

    tracing::info!(project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    Ok(Json(state.projects.list_projects().await?))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let project = state
        .projects
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    Ok(Json(project))
}

/// Delete every stored object of the project, then the project itself.
///
/// If any object fails to delete the project stays and the failed keys are
/// returned with a 500.
#[tracing::instrument(skip_all, fields(project_id = %project_id))]
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let deletion = state.deletion.delete_project(project_id).await?;
    Ok(Json(deletion))
}
