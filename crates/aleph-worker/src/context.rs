//! Job handler trait
//!
//! The queue is generic over its job type; whoever builds the queue supplies
//! the handler that runs each job.

use anyhow::Result;
use async_trait::async_trait;

/// Runs one job taken off a [`crate::JobQueue`].
#[async_trait]
pub trait JobHandler<J>: Send + Sync
where
    J: Send + 'static,
{
    /// Short name used in logs.
    fn job_type(&self) -> &'static str;

    async fn handle(&self, job: J) -> Result<()>;
}
