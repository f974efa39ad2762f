//! Aleph background workers
//!
//! A bounded in-process job queue ([`JobQueue`]) drained by a worker pool with
//! a concurrency limit, and the ingest job that runs the ingestion pipeline
//! for one staged file. Production deployments hand uploads to this queue;
//! inline mode calls the same pipeline directly.

pub mod context;
pub mod ingest;
pub mod queue;

pub use context::JobHandler;
pub use ingest::{IngestJob, IngestJobHandler};
pub use queue::{JobQueue, JobQueueConfig};
