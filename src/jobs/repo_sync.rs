//! Repo sync job: resolve and persist a repository's default branch.
//!
//! Always re-derives the branch from the authoritative upstream response
//! and overwrites, so re-running after a partial failure is safe. On
//! success it enqueues a content sync for every notebook of the repository
//! — the explicit half of the dependency chain started by content sync
//! jobs that found the branch missing.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{outcome, Halt, JobHandler, JobKind, JobOutcome, JobQueue, StepResult};
use crate::github::client::GithubClient;
use crate::repository::{NotebookRepository, RepoRepository};

#[derive(Debug, Deserialize)]
struct RepoMetadata {
    default_branch: Option<String>,
}

pub struct RepoSyncJob {
    repos: RepoRepository,
    notebooks: NotebookRepository,
    client: GithubClient,
    queue: Arc<dyn JobQueue>,
}

impl RepoSyncJob {
    pub fn new(
        repos: RepoRepository,
        notebooks: NotebookRepository,
        client: GithubClient,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            repos,
            notebooks,
            client,
            queue,
        }
    }

    pub async fn sync(&self, repo_id: &str) -> JobOutcome {
        outcome(self.run(repo_id).await)
    }

    async fn run(&self, repo_id: &str) -> StepResult<()> {
        let repo = self
            .repos
            .get(repo_id)
            .await
            .map_err(|e| Halt::Retry(anyhow!("failed to load repo {repo_id}: {e}")))?;
        let Some(repo) = repo else {
            return Err(Halt::Cancelled(format!("repo {repo_id} no longer exists")));
        };

        let response = self
            .client
            .fetch_repo(&repo.owner_login, &repo.name)
            .await
            .map_err(|e| Halt::Retry(e.into()))?;

        if response.is_not_found() {
            return Err(Halt::Cancelled(format!(
                "repository {} no longer exists upstream",
                repo.full_name()
            )));
        }
        if !response.is_success() {
            return Err(Halt::Retry(anyhow!(
                "repo metadata request for {} returned HTTP {}",
                repo.full_name(),
                response.status.as_u16()
            )));
        }

        let metadata: RepoMetadata = serde_json::from_str(&response.body).map_err(|e| {
            Halt::Retry(anyhow!(
                "malformed repo metadata for {}: {e}",
                repo.full_name()
            ))
        })?;
        let Some(branch) = metadata.default_branch.filter(|b| !b.is_empty()) else {
            return Err(Halt::Retry(anyhow!(
                "repo metadata for {} is missing default_branch",
                repo.full_name()
            )));
        };

        self.repos
            .set_default_branch(&repo.id, &branch)
            .await
            .map_err(|e| {
                Halt::Retry(anyhow!(
                    "failed to persist default branch for {}: {e}",
                    repo.full_name()
                ))
            })?;

        // Re-trigger content syncs now that the branch is known. The dedup
        // window absorbs notebooks that already have a live job.
        let notebook_ids = self
            .notebooks
            .ids_for_repo(&repo.id)
            .await
            .map_err(|e| Halt::Retry(anyhow!("failed to list notebooks for {repo_id}: {e}")))?;
        let count = notebook_ids.len();
        for notebook_id in notebook_ids {
            self.queue
                .enqueue(JobKind::ContentSync, &notebook_id)
                .await
                .map_err(|e| {
                    Halt::Retry(anyhow!(
                        "failed to enqueue content sync for notebook {notebook_id}: {e}"
                    ))
                })?;
        }

        info!(
            repo = %repo.full_name(),
            branch = %branch,
            notebooks = count,
            "Default branch resolved"
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for RepoSyncJob {
    fn kind(&self) -> JobKind {
        JobKind::RepoSync
    }

    async fn execute(&self, key: &str) -> JobOutcome {
        self.sync(key).await
    }
}
