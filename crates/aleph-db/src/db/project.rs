use aleph_core::models::Project;
use aleph_core::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Project persistence used by the ingestion and deletion services.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn project_exists(&self, id: Uuid) -> Result<bool, AppError>;

    async fn create_project(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Project, AppError>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, AppError>;

    async fn list_projects(&self) -> Result<Vec<Project>, AppError>;

    /// Delete the project row; documents cascade. Returns false when absent.
    async fn delete_project(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Repository for the `projects` table
#[derive(Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectStore for ProjectRepository {
    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select", db.record_id = %id))]
    async fn project_exists(&self, id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self, description), fields(db.table = "projects", db.operation = "insert"))]
    async fn create_project(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<Project, AppError> {
        let project = sqlx::query_as::<Postgres, Project>(
            r#"
            INSERT INTO projects (id, name, description, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(&description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(project)
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select", db.record_id = %id))]
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<Postgres, Project>(
            "SELECT id, name, description, created_at FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select"))]
    async fn list_projects(&self) -> Result<Vec<Project>, AppError> {
        let projects = sqlx::query_as::<Postgres, Project>(
            "SELECT id, name, description, created_at FROM projects ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "delete", db.record_id = %id))]
    async fn delete_project(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
