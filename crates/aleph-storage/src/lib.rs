//! Aleph Storage Library
//!
//! Object storage gateway for uploaded documents and rendered page images.
//! It includes the `ObjectStorage` trait and implementations for S3 and the
//! local filesystem.
//!
//! # Storage key format
//!
//! - **Documents**: `{checksum}_{unix_timestamp}`
//! - **Page images**: `{checksum}_{unix_timestamp}_page_{n}.jpg`
//!
//! Keys must not contain `..` or a leading `/`. Key helpers live in the `keys`
//! module so all callers stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use aleph_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{BulkDeleteReport, FailedDelete, ObjectStorage, StorageError, StorageResult};
