//! Configuration module
//!
//! Process configuration for the ingestion service: server, database, storage,
//! dispatch and external tool settings, loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_DOCUMENT_SIZE_MB: usize = 50;
const INGEST_MAX_WORKERS: usize = 4;
const INGEST_QUEUE_SIZE: usize = 1000;

/// How a batch upload is executed once its files are staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run the pipeline inside the request and return per-file outcomes.
    Inline,
    /// Hand each staged file to the background worker pool.
    Queued,
}

impl FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" | "sync" => Ok(DispatchMode::Inline),
            "queued" | "queue" | "background" => Ok(DispatchMode::Queued),
            _ => Err(anyhow::anyhow!("Invalid dispatch mode: {}", s)),
        }
    }
}

/// Paths of the external tools used during extraction and rasterization.
#[derive(Clone, Debug)]
pub struct ToolPaths {
    pub tesseract_path: String,
    pub tesseract_lang: String,
    pub pdftoppm_path: String,
    pub pdfimages_path: String,
    pub antiword_path: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            tesseract_lang: "eng".to_string(),
            pdftoppm_path: "pdftoppm".to_string(),
            pdfimages_path: "pdfimages".to_string(),
            antiword_path: "antiword".to_string(),
        }
    }
}

/// Ingestion service configuration
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub environment: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub log_format: String,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Pipeline configuration
    pub max_document_size_bytes: usize,
    pub dispatch_mode: DispatchMode,
    pub ingest_max_workers: usize,
    pub ingest_queue_size: usize,
    pub upload_temp_dir: PathBuf,
    pub tools: ToolPaths,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<IngestConfig>);

impl Config {
    fn as_ingest(&self) -> &IngestConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_ingest().environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = IngestConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_ingest().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_ingest().server_port
    }

    pub fn database_url(&self) -> &str {
        &self.as_ingest().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_ingest().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_ingest().db_timeout_seconds
    }

    pub fn log_format(&self) -> &str {
        &self.as_ingest().log_format
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.as_ingest().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_ingest().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_ingest().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_ingest().s3_endpoint.as_deref()
    }

    pub fn aws_access_key_id(&self) -> Option<&str> {
        self.as_ingest().aws_access_key_id.as_deref()
    }

    pub fn aws_secret_access_key(&self) -> Option<&str> {
        self.as_ingest().aws_secret_access_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_ingest().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_ingest().local_storage_base_url.as_deref()
    }

    /// Bucket that documents and page images are written to.
    ///
    /// The local backend has no bucket concept of its own; it uses a fixed
    /// subdirectory name so keys stay laid out the same way.
    pub fn document_bucket(&self) -> &str {
        self.s3_bucket().unwrap_or("documents")
    }

    pub fn max_document_size_bytes(&self) -> usize {
        self.as_ingest().max_document_size_bytes
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.as_ingest().dispatch_mode
    }

    pub fn ingest_max_workers(&self) -> usize {
        self.as_ingest().ingest_max_workers
    }

    pub fn ingest_queue_size(&self) -> usize {
        self.as_ingest().ingest_queue_size
    }

    pub fn upload_temp_dir(&self) -> &std::path::Path {
        &self.as_ingest().upload_temp_dir
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.as_ingest().tools
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn optional_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = optional_var(&["ENVIRONMENT", "APP_ENV", "ENV"])
            .unwrap_or_else(|| "development".to_string());

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse::<u16>()
            .unwrap_or(SERVER_PORT);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .unwrap_or(MAX_CONNECTIONS);

        let db_timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .unwrap_or(CONNECTION_TIMEOUT_SECS);

        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        let storage_backend = match optional_var(&["STORAGE_BACKEND"]) {
            Some(value) => Some(value.parse::<StorageBackend>()?),
            None => None,
        };

        let max_document_size_mb = env::var("MAX_DOCUMENT_SIZE_MB")
            .unwrap_or_else(|_| MAX_DOCUMENT_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_DOCUMENT_SIZE_MB);

        let dispatch_mode = match optional_var(&["INGEST_DISPATCH"]) {
            Some(value) => value.parse::<DispatchMode>()?,
            None if is_production_env(&environment) => DispatchMode::Queued,
            None => DispatchMode::Inline,
        };

        let ingest_max_workers = env::var("INGEST_MAX_WORKERS")
            .unwrap_or_else(|_| INGEST_MAX_WORKERS.to_string())
            .parse::<usize>()
            .unwrap_or(INGEST_MAX_WORKERS);

        let ingest_queue_size = env::var("INGEST_QUEUE_SIZE")
            .unwrap_or_else(|_| INGEST_QUEUE_SIZE.to_string())
            .parse::<usize>()
            .unwrap_or(INGEST_QUEUE_SIZE);

        let upload_temp_dir = optional_var(&["UPLOAD_TEMP_DIR"])
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let defaults = ToolPaths::default();
        let tools = ToolPaths {
            tesseract_path: optional_var(&["TESSERACT_PATH"]).unwrap_or(defaults.tesseract_path),
            tesseract_lang: optional_var(&["TESSERACT_LANG"]).unwrap_or(defaults.tesseract_lang),
            pdftoppm_path: optional_var(&["PDFTOPPM_PATH"]).unwrap_or(defaults.pdftoppm_path),
            pdfimages_path: optional_var(&["PDFIMAGES_PATH"]).unwrap_or(defaults.pdfimages_path),
            antiword_path: optional_var(&["ANTIWORD_PATH"]).unwrap_or(defaults.antiword_path),
        };

        Ok(IngestConfig {
            environment,
            server_port,
            database_url,
            db_max_connections,
            db_timeout_seconds,
            log_format,
            storage_backend,
            s3_bucket: optional_var(&["S3_BUCKET", "ALEPH_BUCKET"]),
            s3_region: optional_var(&["S3_REGION", "REGION", "AWS_REGION"]),
            s3_endpoint: optional_var(&["S3_ENDPOINT"]),
            aws_access_key_id: optional_var(&["AWS_ACCESS_KEY_ID"]),
            aws_secret_access_key: optional_var(&["AWS_SECRET_ACCESS_KEY"]),
            local_storage_path: optional_var(&["LOCAL_STORAGE_PATH"]),
            local_storage_base_url: optional_var(&["LOCAL_STORAGE_BASE_URL"]),
            max_document_size_bytes: max_document_size_mb * 1024 * 1024,
            dispatch_mode,
            ingest_max_workers,
            ingest_queue_size,
            upload_temp_dir,
            tools,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.ingest_max_workers == 0 {
            return Err(anyhow::anyhow!("INGEST_MAX_WORKERS must be at least 1"));
        }

        if self.ingest_queue_size == 0 {
            return Err(anyhow::anyhow!("INGEST_QUEUE_SIZE must be at least 1"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
