//! Hooks for downstream consumers of extracted text
//!
//! The search index is fed after a document is persisted. It is eventually
//! consistent with the relational store: indexing errors are reported to the
//! caller for logging and never undo a committed document.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Payload handed to the search index for one persisted document.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDocument {
    pub document_id: Uuid,
    pub project_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub text: String,
    pub emails: Vec<String>,
}

/// Trait implemented by search index integrations.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Index (or re-index) a persisted document
    async fn index_document(&self, document: SearchDocument) -> Result<(), String>;

    /// Remove a document from the index after it was deleted
    async fn remove_document(&self, document_id: Uuid) -> Result<(), String>;
}

/// No-op implementation for when no search index is configured
pub struct NoOpSearchIndexer;

#[async_trait]
impl SearchIndexer for NoOpSearchIndexer {
    async fn index_document(&self, document: SearchDocument) -> Result<(), String> {
        tracing::debug!(
            document_id = %document.document_id,
            text_len = document.text.len(),
            "Search indexing disabled, skipping document"
        );
        Ok(())
    }

    async fn remove_document(&self, _document_id: Uuid) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_indexer_accepts_everything() {
        let indexer = NoOpSearchIndexer;
        let doc = SearchDocument {
            document_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            file_name: "a.txt".to_string(),
            file_url: "http://localhost/a.txt".to_string(),
            text: "hello".to_string(),
            emails: vec![],
        };
        assert!(indexer.index_document(doc).await.is_ok());
        assert!(indexer.remove_document(Uuid::new_v4()).await.is_ok());
    }
}
