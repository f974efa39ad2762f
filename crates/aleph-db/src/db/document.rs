use aleph_core::models::{
    Document, DocumentMeta, NewDocument, NewPageImage, OcrText, PageImage,
};
use aleph_core::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::transaction::TransactionGuard;

/// Document persistence used by the ingestion and deletion services.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert the document with its metadata and extracted text as one unit.
    ///
    /// A `hash_value` that already exists fails with [`AppError::Duplicate`]
    /// and leaves nothing behind.
    async fn create_document(&self, new: &NewDocument) -> Result<Document, AppError>;

    async fn add_page_image(&self, page: &NewPageImage) -> Result<PageImage, AppError>;

    async fn hash_exists(&self, hash_value: &str) -> Result<bool, AppError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, AppError>;

    async fn get_meta(&self, document_id: Uuid) -> Result<Option<DocumentMeta>, AppError>;

    async fn get_text(&self, document_id: Uuid) -> Result<Option<OcrText>, AppError>;

    /// Page images ordered by page number.
    async fn page_images(&self, document_id: Uuid) -> Result<Vec<PageImage>, AppError>;

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Document>, AppError>;

    /// Every object key owned by the project: document objects and page images.
    async fn project_storage_keys(&self, project_id: Uuid) -> Result<Vec<String>, AppError>;

    /// Delete the document row; metadata, text and page rows cascade.
    async fn delete_document(&self, id: Uuid) -> Result<bool, AppError>;
}

/// Repository for `documents` and its dependent tables
#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, tx, new), fields(db.table = "documents", db.operation = "insert", db.record_id = %new.id))]
    async fn insert_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: &NewDocument,
    ) -> Result<Document, AppError> {
        let document = sqlx::query_as::<Postgres, Document>(
            r#"
            INSERT INTO documents (id, project_id, storage_key, file_name, file_url, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, project_id, storage_key, file_name, file_url, uploaded_at
            "#,
        )
        .bind(new.id)
        .bind(new.project_id)
        .bind(&new.storage_key)
        .bind(&new.file_name)
        .bind(&new.file_url)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(document)
    }

    #[tracing::instrument(skip(self, tx, new), fields(db.table = "document_meta", db.operation = "insert", db.record_id = %new.id))]
    async fn insert_meta_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: &NewDocument,
    ) -> Result<(), AppError> {
        let meta = &new.metadata;
        sqlx::query(
            r#"
            INSERT INTO document_meta (
                id, document_id, hash_value, name, size_bytes, file_type, is_directory,
                creation_time, last_modified_time, last_accessed_time, permissions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.id)
        .bind(&new.hash_value)
        .bind(&meta.name)
        .bind(meta.size_bytes)
        .bind(&meta.file_type)
        .bind(meta.is_directory)
        .bind(&meta.creation_time)
        .bind(&meta.last_modified_time)
        .bind(&meta.last_accessed_time)
        .bind(&meta.permissions)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, tx, new), fields(db.table = "ocr_texts", db.operation = "insert", db.record_id = %new.id, emails = new.emails.len()))]
    async fn insert_text_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new: &NewDocument,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO ocr_texts (id, document_id, text, emails)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.id)
        .bind(&new.text)
        .bind(&new.emails)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for DocumentRepository {
    async fn create_document(&self, new: &NewDocument) -> Result<Document, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let document = self.insert_document_tx(&mut tx, new).await?;
        self.insert_meta_tx(&mut tx, new).await?;
        self.insert_text_tx(&mut tx, new).await?;

        tx.commit().await?;
        Ok(document)
    }

    #[tracing::instrument(skip(self, page), fields(db.table = "page_images", db.operation = "insert", db.record_id = %page.document_id, page = page.page_number))]
    async fn add_page_image(&self, page: &NewPageImage) -> Result<PageImage, AppError> {
        let page = sqlx::query_as::<Postgres, PageImage>(
            r#"
            INSERT INTO page_images (id, document_id, page_number, storage_key, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, document_id, page_number, storage_key, image_url
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(page.document_id)
        .bind(page.page_number)
        .bind(&page.storage_key)
        .bind(&page.image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(page)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_meta", db.operation = "select"))]
    async fn hash_exists(&self, hash_value: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM document_meta WHERE hash_value = $1)",
        )
        .bind(hash_value)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", db.record_id = %id))]
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let document = sqlx::query_as::<Postgres, Document>(
            "SELECT id, project_id, storage_key, file_name, file_url, uploaded_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(document)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_meta", db.operation = "select", db.record_id = %document_id))]
    async fn get_meta(&self, document_id: Uuid) -> Result<Option<DocumentMeta>, AppError> {
        let meta = sqlx::query_as::<Postgres, DocumentMeta>(
            r#"
            SELECT id, document_id, hash_value, name, size_bytes, file_type, is_directory,
                   creation_time, last_modified_time, last_accessed_time, permissions
            FROM document_meta
            WHERE document_id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meta)
    }

    #[tracing::instrument(skip(self), fields(db.table = "ocr_texts", db.operation = "select", db.record_id = %document_id))]
    async fn get_text(&self, document_id: Uuid) -> Result<Option<OcrText>, AppError> {
        let text = sqlx::query_as::<Postgres, OcrText>(
            "SELECT id, document_id, text, emails FROM ocr_texts WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(text)
    }

    #[tracing::instrument(skip(self), fields(db.table = "page_images", db.operation = "select", db.record_id = %document_id))]
    async fn page_images(&self, document_id: Uuid) -> Result<Vec<PageImage>, AppError> {
        let pages = sqlx::query_as::<Postgres, PageImage>(
            r#"
            SELECT id, document_id, page_number, storage_key, image_url
            FROM page_images
            WHERE document_id = $1
            ORDER BY page_number ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pages)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", project_id = %project_id))]
    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Document>, AppError> {
        let documents = sqlx::query_as::<Postgres, Document>(
            r#"
            SELECT id, project_id, storage_key, file_name, file_url, uploaded_at
            FROM documents
            WHERE project_id = $1
            ORDER BY uploaded_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", project_id = %project_id))]
    async fn project_storage_keys(&self, project_id: Uuid) -> Result<Vec<String>, AppError> {
        let keys = sqlx::query_scalar::<Postgres, String>(
            r#"
            SELECT d.storage_key FROM documents d WHERE d.project_id = $1
            UNION ALL
            SELECT p.storage_key
            FROM page_images p
            JOIN documents d ON d.id = p.document_id
            WHERE d.project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "delete", db.record_id = %id))]
    async fn delete_document(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
