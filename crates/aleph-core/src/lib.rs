//! Aleph Core Library
//!
//! This crate provides core domain models, error types and configuration
//! shared across all Aleph components.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, DispatchMode, IngestConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{NoOpSearchIndexer, SearchDocument, SearchIndexer};
pub use storage_types::StorageBackend;
