//! Aleph database layer
//!
//! PostgreSQL repositories for projects and documents. Each repository has a
//! matching `*Store` trait so the services can run against in-memory stores
//! in tests.

pub mod db;

pub use db::{DocumentRepository, DocumentStore, ProjectRepository, ProjectStore};
