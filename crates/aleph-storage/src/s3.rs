use crate::keys::{content_type_for, validate_key};
use crate::traits::{ObjectStorage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStoreExt, PutOptions, PutPayload, Result as ObjectResult,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// S3 storage implementation
///
/// One `AmazonS3` client is built lazily per bucket and cached. The cache lock
/// is only held while looking up or inserting a client, never across a request.
pub struct S3Storage {
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    stores: RwLock<HashMap<String, AmazonS3>>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `access_key_id` / `secret_access_key` - Explicit credentials; when absent the
    ///   usual AWS environment variables apply
    pub fn new(
        region: String,
        endpoint_url: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    ) -> Self {
        S3Storage {
            region,
            endpoint_url,
            access_key_id,
            secret_access_key,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Validate that a client can be built for `bucket`, caching it.
    pub fn warm_up(&self, bucket: &str) -> StorageResult<()> {
        self.store_for(bucket).map(|_| ())
    }

    fn build_store(&self, bucket: &str) -> StorageResult<AmazonS3> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(self.region.clone())
            .with_bucket_name(bucket.to_string());

        if let Some(ref key_id) = self.access_key_id {
            builder = builder.with_access_key_id(key_id.clone());
        }
        if let Some(ref secret) = self.secret_access_key {
            builder = builder.with_secret_access_key(secret.clone());
        }

        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }

    fn store_for(&self, bucket: &str) -> StorageResult<AmazonS3> {
        {
            let stores = self
                .stores
                .read()
                .map_err(|_| StorageError::BackendError("S3 client cache poisoned".to_string()))?;
            if let Some(store) = stores.get(bucket) {
                return Ok(store.clone());
            }
        }

        let store = self.build_store(bucket)?;
        let mut stores = self
            .stores
            .write()
            .map_err(|_| StorageError::BackendError("S3 client cache poisoned".to_string()))?;
        Ok(stores
            .entry(bucket.to_string())
            .or_insert(store)
            .clone())
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style URLs on the endpoint: {endpoint}/{bucket}/{key}
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket, self.region, key
            )
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: String,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key.to_string());

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.clone().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let start = std::time::Instant::now();

        let result: ObjectResult<_> =
            object_store::ObjectStore::put_opts(&store, &location, PutPayload::from(data), opts).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<()> {
        let data = tokio::fs::read(local_path).await.map_err(|e| StorageError::UploadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: format!("Failed to read {}: {}", local_path.display(), e),
        })?;
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.put_object(bucket, key, Bytes::from(data), content_type_for(&name))
            .await
    }

    async fn upload_bytes(&self, data: Vec<u8>, bucket: &str, key: &str) -> StorageResult<()> {
        self.put_object(bucket, key, Bytes::from(data), content_type_for(key))
            .await
    }

    fn url(&self, bucket: &str, key: &str) -> String {
        self.generate_url(bucket, key)
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let start = std::time::Instant::now();
        let location = ObjectPath::from(key.to_string());

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: other.to_string(),
                }
            }
        })?;

        let bytes = result.bytes().await.map_err(|e| StorageError::DownloadFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let location = ObjectPath::from(key.to_string());
        head_outcome(store.head(&location).await, bucket, key)
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        // S3 reports success for missing keys, so look first.
        delete_precheck(self.exists(bucket, key).await, bucket, key)?;

        let store = self.store_for(bucket)?;
        let start = std::time::Instant::now();
        let location = ObjectPath::from(key.to_string());

        let result: ObjectResult<_> = store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Map a HEAD response to presence. Only a provider "not found" means absent.
fn head_outcome<T>(result: ObjectResult<T>, bucket: &str, key: &str) -> StorageResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(ObjectStoreError::NotFound { .. }) => Ok(false),
        Err(e) => {
            tracing::error!(error = %e, bucket = %bucket, key = %key, "S3 head failed");
            Err(StorageError::HeadFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// A delete goes ahead only when the object is known to exist.
fn delete_precheck(exists: StorageResult<bool>, bucket: &str, key: &str) -> StorageResult<()> {
    match exists {
        Ok(true) => Ok(()),
        Ok(false) => Err(StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
        Err(StorageError::HeadFailed { reason, .. }) => Err(StorageError::DeleteFailed {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: format!("existence check failed: {}", reason),
        }),
        Err(e) => Err(e),
    }
}
