use crate::keys::validate_key;
use crate::traits::{ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Each bucket is a subdirectory of `base_path`; objects are files named by key.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/aleph/objects")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:4000/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert bucket and key to a filesystem path, rejecting traversal.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        validate_key(bucket)?;
        validate_key(key)?;
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "Bucket name contains invalid characters: {}",
                bucket
            )));
        }
        Ok(self.base_path.join(bucket).join(key))
    }

    /// Generate public URL for file
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, key)
    }

    async fn write_object(&self, bucket: &str, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let upload_err = |reason: String| StorageError::UploadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_err(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| upload_err(format!("Failed to create file {}: {}", path.display(), e)))?;

        file.write_all(data)
            .await
            .map_err(|e| upload_err(format!("Failed to write file {}: {}", path.display(), e)))?;

        file.sync_all()
            .await
            .map_err(|e| upload_err(format!("Failed to sync file {}: {}", path.display(), e)))?;

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        let data = fs::read(local_path)
            .await
            .map_err(|e| StorageError::UploadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: format!("Failed to read {}: {}", local_path.display(), e),
            })?;
        self.write_object(bucket, key, &data).await
    }

    async fn upload_bytes(&self, data: Vec<u8>, bucket: &str, key: &str) -> StorageResult<()> {
        self.write_object(bucket, key, &data).await
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        self.generate_url(bucket, key)
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;

        fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::DownloadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: format!("Failed to read file {}: {}", path.display(), e),
            },
        })
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let path = self.object_path(bucket, key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::HeadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: format!("Failed to stat {}: {}", path.display(), e),
            })
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Local storage delete failed"
                );
                Err(StorageError::DeleteFailed {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
