//! Deletion of documents and projects
//!
//! Storage always goes first and relational rows second. A row is never
//! deleted while its object might still exist; the opposite failure, an
//! orphaned object with no row, is the accepted one.

use std::sync::Arc;

use aleph_core::{AppError, NoOpSearchIndexer, SearchIndexer};
use aleph_db::{DocumentStore, ProjectStore};
use aleph_storage::ObjectStorage;
use serde::Serialize;
use uuid::Uuid;

/// Summary of a successful project delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDeletion {
    pub project_id: Uuid,
    pub documents_deleted: usize,
    pub objects_deleted: usize,
}

#[derive(Clone)]
pub struct DeletionService {
    projects: Arc<dyn ProjectStore>,
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    indexer: Arc<dyn SearchIndexer>,
    bucket: String,
}

impl DeletionService {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        documents: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            projects,
            documents,
            storage,
            indexer: Arc::new(NoOpSearchIndexer),
            bucket: bucket.into(),
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn SearchIndexer>) -> Self {
        self.indexer = indexer;
        self
    }

    /// Delete a document's page images and object, then its rows.
    ///
    /// Fails closed: any storage failure other than an already-missing object
    /// leaves the rows untouched.
    #[tracing::instrument(skip(self), fields(document_id = %document_id))]
    pub async fn delete_document(&self, document_id: Uuid) -> Result<(), AppError> {
        let document = self
            .documents
            .get_document(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        let page_keys: Vec<String> = self
            .documents
            .page_images(document_id)
            .await?
            .into_iter()
            .map(|page| page.storage_key)
            .collect();

        if !page_keys.is_empty() {
            let report = self.storage.bulk_delete(&self.bucket, &page_keys).await;
            if !report.is_clean() {
                return Err(AppError::StorageDeleteBlocked {
                    failed_keys: report.failed_keys(),
                });
            }
        }

        match self.storage.delete(&self.bucket, &document.storage_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %document.storage_key,
                    "Document object already absent, deleting rows"
                );
            }
            Err(e) => {
                tracing::error!(
                    bucket = %self.bucket,
                    key = %document.storage_key,
                    error = %e,
                    "Storage delete failed, keeping document rows"
                );
                return Err(e.into());
            }
        }

        self.documents.delete_document(document_id).await?;
        self.unindex(document_id).await;

        tracing::info!(
            document_id = %document_id,
            pages = page_keys.len(),
            "Document deleted"
        );
        Ok(())
    }

    /// Bulk-delete every object of a project, then the project and its rows.
    ///
    /// If any key fails to delete, the project is kept and the failed keys are
    /// returned in [`AppError::StorageDeleteBlocked`].
    #[tracing::instrument(skip(self), fields(project_id = %project_id))]
    pub async fn delete_project(&self, project_id: Uuid) -> Result<ProjectDeletion, AppError> {
        if !self.projects.project_exists(project_id).await? {
            return Err(AppError::NotFound("Project does not exist".to_string()));
        }

        let documents = self.documents.list_by_project(project_id).await?;
        let keys = self.documents.project_storage_keys(project_id).await?;

        let report = self.storage.bulk_delete(&self.bucket, &keys).await;
        if !report.is_clean() {
            tracing::error!(
                project_id = %project_id,
                failed = report.failed.len(),
                "Project storage cleanup incomplete, keeping project"
            );
            return Err(AppError::StorageDeleteBlocked {
                failed_keys: report.failed_keys(),
            });
        }

        self.projects.delete_project(project_id).await?;
        for document in &documents {
            self.unindex(document.id).await;
        }

        tracing::info!(
            project_id = %project_id,
            documents = documents.len(),
            objects = report.deleted.len(),
            "Project deleted"
        );

        Ok(ProjectDeletion {
            project_id,
            documents_deleted: documents.len(),
            objects_deleted: report.deleted.len(),
        })
    }

    async fn unindex(&self, document_id: Uuid) {
        if let Err(e) = self.indexer.remove_document(document_id).await {
            tracing::warn!(document_id = %document_id, error = %e, "Search index removal failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[tokio::test]
    async fn document_delete_removes_objects_then_rows() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        let document_id = harness.seed_document(project_id, "abc_1", 2);

        harness.deletion_service().delete_document(document_id).await.unwrap();

        assert!(!harness.storage.has(&harness.bucket, "abc_1"));
        assert!(!harness.storage.has(&harness.bucket, "abc_1_page_1.jpg"));
        assert_eq!(harness.store.document_count(), 0);
        assert_eq!(harness.indexer.removed(), vec![document_id]);
    }

    #[tokio::test]
    async fn document_delete_fails_closed_on_storage_error() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        let document_id = harness.seed_document(project_id, "abc_1", 0);
        harness.storage.fail_delete_for("abc_1");

        let err = harness
            .deletion_service()
            .delete_document(document_id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(harness.store.document_count(), 1);
    }

    #[tokio::test]
    async fn document_delete_proceeds_when_object_already_gone() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        let document_id = harness.seed_document(project_id, "abc_1", 0);
        harness.storage.remove(&harness.bucket, "abc_1");

        harness.deletion_service().delete_document(document_id).await.unwrap();
        assert_eq!(harness.store.document_count(), 0);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let harness = Harness::new();
        let err = harness
            .deletion_service()
            .delete_document(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn project_delete_is_gated_on_bulk_delete() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        harness.seed_document(project_id, "k1", 0);
        harness.seed_document(project_id, "k2", 0);
        harness.seed_document(project_id, "k3", 0);
        harness.storage.fail_delete_for("k2");

        let err = harness
            .deletion_service()
            .delete_project(project_id)
            .await
            .unwrap_err();

        match err {
            AppError::StorageDeleteBlocked { failed_keys } => {
                assert_eq!(failed_keys, vec!["k2".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!harness.storage.has(&harness.bucket, "k1"));
        assert!(harness.storage.has(&harness.bucket, "k2"));
        assert!(!harness.storage.has(&harness.bucket, "k3"));
        assert!(harness.store.has_project(project_id));
        assert_eq!(harness.store.document_count(), 3);
    }

    #[tokio::test]
    async fn project_delete_removes_everything() {
        let harness = Harness::new();
        let project_id = harness.store.add_project("acme");
        harness.seed_document(project_id, "k1", 2);
        harness.seed_document(project_id, "k2", 0);

        let deletion = harness
            .deletion_service()
            .delete_project(project_id)
            .await
            .unwrap();

        assert_eq!(deletion.documents_deleted, 2);
        assert_eq!(deletion.objects_deleted, 4);
        assert_eq!(harness.storage.object_count(), 0);
        assert!(!harness.store.has_project(project_id));
        assert_eq!(harness.store.document_count(), 0);
    }
}
