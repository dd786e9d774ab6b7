//! SQLite-backed job queue.
//!
//! Enqueues are deduplicated per (kind, key) within a time window across
//! live states, so retries and overlapping producers cannot start two
//! concurrent runs for the same notebook or repo. Claims are atomic
//! queued→executing transitions inside a transaction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::{JobKind, JobOutcome};
use crate::repository::models::{JobRecord, NewJob};
use crate::repository::pool::{run_blocking, DieselError, SqlitePool};
use crate::schema::jobs;

diesel::define_sql_function! {
    fn last_insert_rowid() -> diesel::sql_types::Integer;
}

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Window during which duplicate (kind, key) enqueues are no-ops.
    pub dedup_window: Duration,
    /// Attempt ceiling before a job is dead-lettered as `failed`.
    pub max_attempts: u32,
    /// Base delay for exponential retry backoff.
    pub backoff_base: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(600),
            max_attempts: 5,
            backoff_base: Duration::from_secs(30),
        }
    }
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new job row was created.
    Queued(i32),
    /// An identical live job already exists; nothing was inserted.
    Duplicate,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue database error: {0}")]
    Database(#[from] DieselError),
}

/// Producer-side queue interface, injectable into jobs and services.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, kind: JobKind, key: &str) -> Result<Enqueued, QueueError>;
}

/// Per-state job counts, for stats output.
#[derive(Debug, Default, Clone)]
pub struct JobStats {
    pub queued: u64,
    pub executing: u64,
    pub done: u64,
    pub cancelled: u64,
    pub failed: u64,
}

/// The SQLite-backed queue used in production and integration tests.
#[derive(Clone)]
pub struct SqliteJobQueue {
    pool: SqlitePool,
    config: QueueConfig,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_config(pool, QueueConfig::default())
    }

    pub fn with_config(pool: SqlitePool, config: QueueConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Claim the next due job, transitioning it to `executing`.
    pub async fn claim_next(&self) -> Result<Option<JobRecord>, QueueError> {
        let pool = self.pool.clone();

        let claimed = run_blocking(pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let now = Utc::now().to_rfc3339();

                let Some(job) = jobs::table
                    .filter(jobs::state.eq("queued"))
                    .filter(jobs::run_at.le(&now))
                    .order((jobs::run_at.asc(), jobs::id.asc()))
                    .select(JobRecord::as_select())
                    .first::<JobRecord>(conn)
                    .optional()?
                else {
                    return Ok(None);
                };

                diesel::update(jobs::table.find(job.id))
                    .set((jobs::state.eq("executing"), jobs::updated_at.eq(&now)))
                    .execute(conn)?;

                Ok(Some(JobRecord {
                    state: "executing".to_string(),
                    ..job
                }))
            })
        })
        .await?;

        Ok(claimed)
    }

    /// Apply a job outcome: done, cancelled, or rescheduled with backoff
    /// until the attempt ceiling dead-letters it.
    pub async fn complete(&self, job_id: i32, outcome: &JobOutcome) -> Result<(), QueueError> {
        let pool = self.pool.clone();
        let max_attempts = self.config.max_attempts;
        let backoff_base = self.config.backoff_base;

        let update = match outcome {
            JobOutcome::Synced => ("done".to_string(), None, None),
            JobOutcome::Cancelled(reason) => ("cancelled".to_string(), Some(reason.clone()), None),
            JobOutcome::Retryable(error) => (
                "retry".to_string(),
                Some(format!("{error:#}")),
                Some(backoff_base),
            ),
        };

        run_blocking(pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let now = Utc::now().to_rfc3339();
                let (state, last_error, backoff) = update;

                match backoff {
                    None => {
                        diesel::update(jobs::table.find(job_id))
                            .set((
                                jobs::state.eq(&state),
                                jobs::last_error.eq(last_error.as_deref()),
                                jobs::updated_at.eq(&now),
                            ))
                            .execute(conn)?;
                    }
                    Some(base) => {
                        let job: JobRecord = jobs::table
                            .find(job_id)
                            .select(JobRecord::as_select())
                            .first(conn)?;

                        let attempts = job.attempts + 1;
                        if attempts as u32 >= max_attempts {
                            diesel::update(jobs::table.find(job_id))
                                .set((
                                    jobs::state.eq("failed"),
                                    jobs::attempts.eq(attempts),
                                    jobs::last_error.eq(last_error.as_deref()),
                                    jobs::updated_at.eq(&now),
                                ))
                                .execute(conn)?;
                        } else {
                            let exp = (attempts - 1).clamp(0, 6) as u32;
                            let delay = base * 2u32.pow(exp);
                            let run_at = (Utc::now()
                                + chrono::Duration::milliseconds(delay.as_millis() as i64))
                            .to_rfc3339();
                            diesel::update(jobs::table.find(job_id))
                                .set((
                                    jobs::state.eq("queued"),
                                    jobs::attempts.eq(attempts),
                                    jobs::run_at.eq(&run_at),
                                    jobs::last_error.eq(last_error.as_deref()),
                                    jobs::updated_at.eq(&now),
                                ))
                                .execute(conn)?;
                        }
                    }
                }

                Ok(())
            })
        })
        .await?;

        Ok(())
    }

    /// Get a job row by ID.
    pub async fn get(&self, job_id: i32) -> Result<Option<JobRecord>, QueueError> {
        let pool = self.pool.clone();

        let job = run_blocking(pool, move |conn| {
            jobs::table
                .find(job_id)
                .select(JobRecord::as_select())
                .first::<JobRecord>(conn)
                .optional()
        })
        .await?;

        Ok(job)
    }

    /// All live (queued/executing) jobs of a kind, for diagnostics.
    pub async fn live_jobs(&self, kind: JobKind) -> Result<Vec<JobRecord>, QueueError> {
        let pool = self.pool.clone();
        let kind = kind.as_str();

        let rows = run_blocking(pool, move |conn| {
            jobs::table
                .filter(jobs::kind.eq(kind))
                .filter(jobs::state.eq_any(["queued", "executing"]))
                .order(jobs::id.asc())
                .select(JobRecord::as_select())
                .load::<JobRecord>(conn)
        })
        .await?;

        Ok(rows)
    }

    /// Per-state counts.
    pub async fn stats(&self) -> Result<JobStats, QueueError> {
        #[derive(QueryableByName)]
        struct StateCount {
            #[diesel(sql_type = diesel::sql_types::Text)]
            state: String,
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            count: i64,
        }

        let pool = self.pool.clone();

        let rows: Vec<StateCount> = run_blocking(pool, move |conn| {
            diesel::sql_query("SELECT state, COUNT(*) as count FROM jobs GROUP BY state")
                .load(conn)
        })
        .await?;

        let mut stats = JobStats::default();
        for row in rows {
            let count = row.count as u64;
            match row.state.as_str() {
                "queued" => stats.queued = count,
                "executing" => stats.executing = count,
                "done" => stats.done = count,
                "cancelled" => stats.cancelled = count,
                "failed" => stats.failed = count,
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, kind: JobKind, key: &str) -> Result<Enqueued, QueueError> {
        let pool = self.pool.clone();
        let key_owned = key.to_string();
        let kind_str = kind.as_str();
        let window = self.config.dedup_window;

        let result = run_blocking(pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let now = Utc::now();
                let cutoff =
                    (now - chrono::Duration::milliseconds(window.as_millis() as i64)).to_rfc3339();

                let existing: Option<i32> = jobs::table
                    .filter(jobs::kind.eq(kind_str))
                    .filter(jobs::key.eq(&key_owned))
                    .filter(jobs::state.eq_any(["queued", "executing"]))
                    .filter(jobs::created_at.gt(&cutoff))
                    .select(jobs::id)
                    .first(conn)
                    .optional()?;

                if existing.is_some() {
                    return Ok(Enqueued::Duplicate);
                }

                let now_str = now.to_rfc3339();
                diesel::insert_into(jobs::table)
                    .values(NewJob {
                        kind: kind_str,
                        key: &key_owned,
                        state: "queued",
                        attempts: 0,
                        run_at: &now_str,
                        last_error: None,
                        created_at: &now_str,
                        updated_at: &now_str,
                    })
                    .execute(conn)?;

                let id: i32 = diesel::select(last_insert_rowid()).get_result(conn)?;
                Ok(Enqueued::Queued(id))
            })
        })
        .await?;

        if let Enqueued::Queued(id) = result {
            debug!(kind = %kind, key, id, "Job enqueued");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::migrations::run_migrations;
    use crate::repository::pool::create_pool_from_url;
    use tempfile::tempdir;

    async fn setup_queue(config: QueueConfig) -> (SqliteJobQueue, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let pool = create_pool_from_url(&db_path.display().to_string()).unwrap();
        run_migrations(pool.clone()).await.unwrap();
        (SqliteJobQueue::with_config(pool, config), dir)
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_within_window() {
        let (queue, _dir) = setup_queue(QueueConfig::default()).await;

        let first = queue.enqueue(JobKind::ContentSync, "nb-1").await.unwrap();
        assert!(matches!(first, Enqueued::Queued(_)));

        let second = queue.enqueue(JobKind::ContentSync, "nb-1").await.unwrap();
        assert_eq!(second, Enqueued::Duplicate);

        // Different key and different kind are both fresh
        assert!(matches!(
            queue.enqueue(JobKind::ContentSync, "nb-2").await.unwrap(),
            Enqueued::Queued(_)
        ));
        assert!(matches!(
            queue.enqueue(JobKind::RepoSync, "nb-1").await.unwrap(),
            Enqueued::Queued(_)
        ));
    }

    #[tokio::test]
    async fn test_terminal_job_does_not_block_requeue() {
        let (queue, _dir) = setup_queue(QueueConfig::default()).await;

        let Enqueued::Queued(id) = queue.enqueue(JobKind::ContentSync, "nb-1").await.unwrap()
        else {
            panic!("expected fresh enqueue");
        };
        queue
            .complete(id, &JobOutcome::Cancelled("gone".into()))
            .await
            .unwrap();

        assert!(matches!(
            queue.enqueue(JobKind::ContentSync, "nb-1").await.unwrap(),
            Enqueued::Queued(_)
        ));
    }

    #[tokio::test]
    async fn test_claim_transitions_to_executing() {
        let (queue, _dir) = setup_queue(QueueConfig::default()).await;

        queue.enqueue(JobKind::RepoSync, "repo-1").await.unwrap();
        let claimed = queue.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.kind, "repo_sync");
        assert_eq!(claimed.key, "repo-1");
        assert_eq!(claimed.state, "executing");

        // Nothing else due
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retryable_reschedules_then_dead_letters() {
        let config = QueueConfig {
            max_attempts: 2,
            backoff_base: Duration::from_millis(0),
            ..QueueConfig::default()
        };
        let (queue, _dir) = setup_queue(config).await;

        let Enqueued::Queued(id) = queue.enqueue(JobKind::ContentSync, "nb-1").await.unwrap()
        else {
            panic!("expected fresh enqueue");
        };

        queue
            .complete(id, &JobOutcome::Retryable(anyhow::anyhow!("timeout")))
            .await
            .unwrap();
        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, "queued");
        assert_eq!(job.attempts, 1);
        assert!(job.last_error.unwrap().contains("timeout"));

        queue
            .complete(id, &JobOutcome::Retryable(anyhow::anyhow!("timeout again")))
            .await
            .unwrap();
        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, "failed");
        assert_eq!(job.attempts, 2);
    }

    #[tokio::test]
    async fn test_cancelled_records_reason_and_stays_terminal() {
        let (queue, _dir) = setup_queue(QueueConfig::default()).await;

        let Enqueued::Queued(id) = queue.enqueue(JobKind::ContentSync, "nb-9").await.unwrap()
        else {
            panic!("expected fresh enqueue");
        };
        queue
            .complete(id, &JobOutcome::Cancelled("notebook nb-9 no longer exists".into()))
            .await
            .unwrap();

        let job = queue.get(id).await.unwrap().unwrap();
        assert_eq!(job.state, "cancelled");
        assert_eq!(job.attempts, 0);
        assert!(job.last_error.unwrap().contains("nb-9"));
        assert!(queue.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_counts_states() {
        let (queue, _dir) = setup_queue(QueueConfig::default()).await;

        queue.enqueue(JobKind::ContentSync, "a").await.unwrap();
        queue.enqueue(JobKind::ContentSync, "b").await.unwrap();
        let Enqueued::Queued(id) = queue.enqueue(JobKind::RepoSync, "r").await.unwrap() else {
            panic!("expected fresh enqueue");
        };
        queue.complete(id, &JobOutcome::Synced).await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.queued, 2);
        assert_eq!(stats.done, 1);
    }
}
