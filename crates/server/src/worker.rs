//! Bounded background job queue.
//!
//! Push work is executed off the request path by a single consumer task
//! draining a bounded FIFO. Enqueueing blocks once the buffer is full, which
//! bounds memory and gives natural backpressure to producers. Jobs run
//! serially, so per-job progress is deterministic.

use crate::error::{ApiError, ApiResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use templar_metadata::{JobRepo, JobUpdate, MetadataStore, job_status};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A unit of background work tied to a job row.
struct Job {
    job_id: i64,
    task: Pin<Box<dyn Future<Output = ()> + Send>>,
}

/// Handle for enqueueing background jobs.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Create a queue with the given buffer capacity and spawn its worker.
    ///
    /// The worker runs every job inside its own spawned task so that a panic
    /// is contained: the panicking job is marked `error` in the catalog and
    /// the worker moves on to the next job.
    pub fn new(buffer: usize, metadata: Arc<dyn MetadataStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(buffer);

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let job_id = job.job_id;
                debug!(job_id, "executing job");

                let run = tokio::spawn(job.task);
                if let Err(join_err) = run.await {
                    if join_err.is_panic() {
                        error!(job_id, panic = ?join_err, "job panicked, marking as error");
                        let update = JobUpdate::status(job_status::ERROR)
                            .with_error("job panicked")
                            .with_completed_at(OffsetDateTime::now_utc());
                        if let Err(e) = metadata.update_job(job_id, &update).await {
                            error!(job_id, error = %e, "failed to mark panicked job as error");
                        }
                    }
                }
            }
        });

        (Self { tx }, worker)
    }

    /// Enqueue a job, waiting for buffer space when the queue is full.
    pub async fn enqueue(
        &self,
        job_id: i64,
        task: impl Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        self.tx
            .send(Job {
                job_id,
                task: Box::pin(task),
            })
            .await
            .map_err(|_| ApiError::Internal("job worker is not running".to_string()))
    }
}
