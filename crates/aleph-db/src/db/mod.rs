//! Database repositories for data access layer
//!
//! `projects` is only read by the pipeline for existence checks and by the
//! project delete path. `documents` owns the 1:1 `document_meta` and
//! `ocr_texts` rows and the 1:N `page_images` rows.

pub mod document;
pub mod project;
pub mod transaction;

pub use document::{DocumentRepository, DocumentStore};
pub use project::{ProjectRepository, ProjectStore};
