//! Storage abstraction trait
//!
//! This module defines the `ObjectStorage` trait that all storage backends implement.

use crate::StorageBackend;
use aleph_core::AppError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::Path;
use thiserror::Error;

/// Concurrent deletes issued by `bulk_delete`.
const BULK_DELETE_CONCURRENCY: usize = 64;

/// Storage operation errors
///
/// Every transport failure carries the bucket and key it happened on.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload of {bucket}/{key} failed: {reason}")]
    UploadFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Download of {bucket}/{key} failed: {reason}")]
    DownloadFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Delete of {bucket}/{key} failed: {reason}")]
    DeleteFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Lookup of {bucket}/{key} failed: {reason}")]
    HeadFailed {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { bucket, key } => {
                AppError::NotFound(format!("Object {}/{} does not exist", bucket, key))
            }
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A key that could not be deleted during a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelete {
    pub key: String,
    pub reason: String,
}

/// Outcome of a best-effort multi-object delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDelete>,
}

impl BulkDeleteReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_keys(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.key.clone()).collect()
    }
}

/// Storage abstraction trait
///
/// Backends address objects by `(bucket, key)`. URLs are derived from that pair
/// without a network call.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a local file. The content type is inferred from the file name.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()>;

    /// Upload an in-memory buffer. The content type is inferred from the key.
    async fn upload_bytes(&self, data: Vec<u8>, bucket: &str, key: &str) -> StorageResult<()>;

    /// Public URL of an object
    fn url(&self, bucket: &str, key: &str) -> String;

    /// Download an object
    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Check if an object exists
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Delete one object. A missing object yields `StorageError::NotFound`.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Best-effort delete of many objects.
    ///
    /// Never fails as a whole; keys that could not be deleted are listed in the
    /// report in input order. Keys that were already gone count as deleted.
    async fn bulk_delete(&self, bucket: &str, keys: &[String]) -> BulkDeleteReport {
        let mut results: Vec<(usize, String, StorageResult<()>)> = stream::iter(keys.iter().cloned().enumerate())
            .map(|(idx, key)| async move {
                let result = self.delete(bucket, &key).await;
                (idx, key, result)
            })
            .buffer_unordered(BULK_DELETE_CONCURRENCY)
            .collect()
            .await;
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut report = BulkDeleteReport::default();
        for (_, key, result) in results {
            match result {
                Ok(()) => report.deleted.push(key),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(bucket = %bucket, key = %key, "Object already absent during bulk delete");
                    report.deleted.push(key);
                }
                Err(e) => report.failed.push(FailedDelete {
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                bucket = %bucket,
                failed = report.failed.len(),
                deleted = report.deleted.len(),
                "Bulk delete finished with failures"
            );
        }

        report
    }

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
