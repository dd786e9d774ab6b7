//! Sweep service: re-enqueue notebooks whose content is still unresolved.
//!
//! Covers the gap left by cancelled or dead-lettered syncs without relying
//! on hidden callbacks: anything with NULL content gets another chance,
//! and the queue's dedup window suppresses notebooks that already have a
//! live job.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::jobs::{Enqueued, JobKind, JobQueue};
use crate::repository::NotebookRepository;

/// Summary of one sweep run.
#[derive(Debug, Default, Clone)]
pub struct SweepResult {
    pub examined: usize,
    pub enqueued: usize,
}

pub struct SweepService {
    notebooks: NotebookRepository,
    queue: Arc<dyn JobQueue>,
}

impl SweepService {
    pub fn new(notebooks: NotebookRepository, queue: Arc<dyn JobQueue>) -> Self {
        Self { notebooks, queue }
    }

    /// Re-enqueue up to `limit` notebooks with unresolved content.
    pub async fn run(&self, limit: u32) -> Result<SweepResult> {
        let ids = self.notebooks.unresolved_ids(limit).await?;

        let mut result = SweepResult {
            examined: ids.len(),
            ..SweepResult::default()
        };
        for id in ids {
            if let Enqueued::Queued(_) = self.queue.enqueue(JobKind::ContentSync, &id).await? {
                result.enqueued += 1;
            }
        }

        info!(
            examined = result.examined,
            enqueued = result.enqueued,
            "Sweep complete"
        );
        Ok(result)
    }
}
