//! Aleph Services Layer
//!
//! Business services that coordinate storage, processing and persistence:
//!
//! - [`ingest`]: the per-file ingestion state machine and batch driver
//! - [`deletion`]: storage-first deletion of documents and projects
//!
//! The API crate depends on this crate as its single service facade. Keep
//! coordination here and thin HTTP handling in aleph-api.

pub mod deletion;
pub mod ingest;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use deletion::{DeletionService, ProjectDeletion};
pub use ingest::{
    BatchOutcome, FileOutcome, FileReport, IngestService, IngestSettings, IngestState,
    StagedUpload,
};

pub use aleph_db::{DocumentStore, ProjectStore};
pub use aleph_processing::{FileExtractor, PageRenderer, PdftoppmRenderer, TextExtractor};
pub use aleph_storage::{create_storage, ObjectStorage, StorageError};
