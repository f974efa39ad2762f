//! Data models for the application
//!
//! Projects group documents; each document owns one metadata record, one
//! extracted-text record and zero or more rendered page images.

mod document;
mod project;

pub use document::*;
pub use project::*;
