//! Bounded job queue with a fixed-size worker pool.
//!
//! Shutdown: [`JobQueue::shutdown`] closes the channel, lets queued jobs drain
//! and waits until every in-flight job has finished.

use std::sync::Arc;

use aleph_core::{AppError, Config};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::context::JobHandler;

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    /// Jobs running at the same time.
    pub max_workers: usize,
    /// Jobs waiting beyond the running ones before `submit_batch` rejects.
    pub queue_size: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            queue_size: 1000,
        }
    }
}

impl JobQueueConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.ingest_max_workers(),
            queue_size: config.ingest_queue_size(),
        }
    }
}

pub struct JobQueue<J> {
    tx: mpsc::Sender<J>,
    pool: JoinHandle<()>,
}

impl<J> JobQueue<J>
where
    J: Send + 'static,
{
    /// Create the queue and spawn its worker pool.
    pub fn new(handler: Arc<dyn JobHandler<J>>, config: JobQueueConfig) -> Self {
        let queue_size = config.queue_size.max(1);
        let max_workers = config.max_workers.max(1);
        let (tx, rx) = mpsc::channel(queue_size);

        let job_type = handler.job_type();
        let pool = tokio::spawn(Self::worker_pool(rx, handler, max_workers));

        tracing::info!(
            job_type = job_type,
            queue_size = queue_size,
            max_workers = max_workers,
            "Job queue initialized with bounded channel"
        );

        Self { tx, pool }
    }

    /// Enqueue a whole batch or none of it.
    ///
    /// Room for every job is reserved before any is sent, so a rejected batch
    /// leaves nothing behind in the queue.
    pub fn submit_batch(&self, jobs: Vec<J>) -> Result<(), AppError> {
        let permits = self.tx.try_reserve_many(jobs.len()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!(jobs = jobs.len(), "Job queue has no room for batch, rejecting");
                AppError::QueueUnavailable("Job queue is full, please try again later".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::QueueUnavailable("Job queue is shut down".to_string())
            }
        })?;

        for (permit, job) in permits.zip(jobs) {
            permit.send(job);
        }
        Ok(())
    }

    /// Number of further jobs `submit_batch` would currently accept.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Stop accepting jobs, finish queued and running ones, then return.
    pub async fn shutdown(self) {
        let JobQueue { tx, pool } = self;
        drop(tx);
        if let Err(e) = pool.await {
            tracing::error!(error = %e, "Job worker pool terminated abnormally");
        }
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<J>,
        handler: Arc<dyn JobHandler<J>>,
        max_workers: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_workers));

        while let Some(job) = rx.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let handler = handler.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let start = std::time::Instant::now();
                match handler.handle(job).await {
                    Ok(()) => tracing::debug!(
                        job_type = handler.job_type(),
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Job finished"
                    ),
                    Err(e) => tracing::error!(
                        job_type = handler.job_type(),
                        error = %e,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Job processing failed"
                    ),
                }
            });
        }

        // Channel closed: wait for in-flight jobs by taking every permit.
        if semaphore.acquire_many(max_workers as u32).await.is_ok() {
            tracing::info!("Job worker pool drained");
        }
    }
}
