//! Aleph API Library
//!
//! HTTP surface of the ingestion pipeline: batch upload, document reads,
//! storage-first deletion and health, plus application setup.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppState, Dispatcher, UploadConfig};
