//! Worker pool executing queued jobs.
//!
//! Workers claim jobs from the SQLite queue, dispatch them to registered
//! handlers, and report outcomes back. Each job runs to completion on one
//! worker; graceful shutdown is signalled over a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::queue::SqliteJobQueue;
use super::{JobHandler, JobKind, JobOutcome};
use crate::repository::models::JobRecord;

pub struct WorkerPool {
    queue: SqliteJobQueue,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    workers: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(queue: SqliteJobQueue, workers: usize) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            workers: workers.max(1),
            poll_interval: Duration::from_millis(1000),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Register a handler for its job kind.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Run workers until a shutdown signal arrives on `shutdown`.
    pub async fn run(&self, shutdown: broadcast::Sender<()>) {
        info!(workers = self.workers, "Worker pool started");

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let queue = self.queue.clone();
            let handlers = self.handlers.clone();
            let poll_interval = self.poll_interval;
            let mut shutdown_rx = shutdown.subscribe();

            handles.push(tokio::spawn(async move {
                loop {
                    // Check for shutdown between jobs; a claimed job always
                    // runs to completion.
                    match shutdown_rx.try_recv() {
                        Err(broadcast::error::TryRecvError::Empty) => {}
                        _ => {
                            debug!(worker_id, "Worker received shutdown signal");
                            break;
                        }
                    }

                    match queue.claim_next().await {
                        Ok(Some(job)) => {
                            run_one(&queue, &handlers, job).await;
                        }
                        Ok(None) => {
                            tokio::select! {
                                _ = shutdown_rx.recv() => {
                                    debug!(worker_id, "Worker received shutdown signal");
                                    break;
                                }
                                _ = tokio::time::sleep(poll_interval) => {}
                            }
                        }
                        Err(e) => {
                            warn!(worker_id, error = %e, "Failed to claim job");
                            tokio::time::sleep(poll_interval).await;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        info!("Worker pool stopped");
    }

    /// Drain the queue until no job is due, for one-shot CLI runs and tests.
    pub async fn drain(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.queue.claim_next().await {
                Ok(Some(job)) => {
                    run_one(&self.queue, &self.handlers, job).await;
                    processed += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to claim job");
                    break;
                }
            }
        }
        processed
    }
}

async fn run_one(
    queue: &SqliteJobQueue,
    handlers: &HashMap<JobKind, Arc<dyn JobHandler>>,
    job: JobRecord,
) {
    let outcome = match JobKind::parse(&job.kind) {
        Some(kind) => match handlers.get(&kind) {
            Some(handler) => handler.execute(&job.key).await,
            None => JobOutcome::Cancelled(format!("no handler registered for {kind}")),
        },
        None => JobOutcome::Cancelled(format!("unknown job kind {}", job.kind)),
    };

    match &outcome {
        JobOutcome::Synced => {
            debug!(job_id = job.id, kind = %job.kind, key = %job.key, "Job synced");
        }
        JobOutcome::Cancelled(reason) => {
            // Expected steady-state condition, not a fault
            info!(job_id = job.id, kind = %job.kind, key = %job.key, reason = %reason, "Job cancelled");
        }
        JobOutcome::Retryable(error) => {
            warn!(job_id = job.id, kind = %job.kind, key = %job.key, error = %error, "Job failed, will retry");
        }
    }

    if let Err(e) = queue.complete(job.id, &outcome).await {
        warn!(job_id = job.id, error = %e, "Failed to record job outcome");
    }
}
