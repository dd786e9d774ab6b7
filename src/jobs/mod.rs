//! Background job pipeline: outcomes, handlers, queue, and workers.
//!
//! Jobs report exactly one of three outcomes. `Synced` completes the job,
//! `Cancelled` is terminal and never retried (expected steady-state
//! conditions like upstream deletions), and `Retryable` hands the job back
//! to the queue for another attempt under its backoff policy.

pub mod content_sync;
pub mod queue;
pub mod repo_sync;
pub mod worker;

use async_trait::async_trait;

pub use content_sync::ContentSyncJob;
pub use queue::{Enqueued, JobQueue, QueueConfig, QueueError, SqliteJobQueue};
pub use repo_sync::RepoSyncJob;
pub use worker::WorkerPool;

/// The kinds of background work nbharvest runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ContentSync,
    RepoSync,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ContentSync => "content_sync",
            JobKind::RepoSync => "repo_sync",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content_sync" => Some(JobKind::ContentSync),
            "repo_sync" => Some(JobKind::RepoSync),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one job run.
#[derive(Debug)]
pub enum JobOutcome {
    Synced,
    /// Terminal: do not retry, do not alert.
    Cancelled(String),
    /// Transient: return to the queue for backoff and retry.
    Retryable(anyhow::Error),
}

/// Short-circuit signal for a pipeline stage.
///
/// Stages return `Result<T, Halt>` and chain with `?`; the first non-Ok
/// stage decides the whole run's outcome.
#[derive(Debug)]
pub enum Halt {
    Cancelled(String),
    Retry(anyhow::Error),
}

/// Result type for pipeline stages.
pub type StepResult<T> = Result<T, Halt>;

impl From<Halt> for JobOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Cancelled(reason) => JobOutcome::Cancelled(reason),
            Halt::Retry(error) => JobOutcome::Retryable(error),
        }
    }
}

/// Collapse a completed stage chain into a job outcome.
pub fn outcome(result: StepResult<()>) -> JobOutcome {
    match result {
        Ok(()) => JobOutcome::Synced,
        Err(halt) => halt.into(),
    }
}

/// A unit of background work executable by the worker pool.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Run the job for one key (notebook id or repo id).
    async fn execute(&self, key: &str) -> JobOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trip() {
        for kind in [JobKind::ContentSync, JobKind::RepoSync] {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("unknown"), None);
    }

    #[test]
    fn test_halt_converts_to_outcome() {
        match JobOutcome::from(Halt::Cancelled("gone".into())) {
            JobOutcome::Cancelled(reason) => assert_eq!(reason, "gone"),
            other => panic!("unexpected outcome {other:?}"),
        }
        match JobOutcome::from(Halt::Retry(anyhow::anyhow!("timeout"))) {
            JobOutcome::Retryable(err) => assert!(err.to_string().contains("timeout")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
