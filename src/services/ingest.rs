//! Ingestion service: search → upsert → enqueue.
//!
//! Each discovered candidate is attributed to a user, tied to a repo, and
//! upserted by its `(owner_login, repo_name, filename)` identity before a
//! content sync job is enqueued for it. The whole path is idempotent, so
//! overlapping search pages are safe.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::github::client::GithubClient;
use crate::github::search::{search, SearchOptions};
use crate::jobs::{Enqueued, JobKind, JobQueue};
use crate::models::Notebook;
use crate::repository::{NotebookRepository, RepoRepository, UserRepository};

/// Summary of one ingested search page.
#[derive(Debug, Default, Clone)]
pub struct IngestResult {
    /// Well-formed candidates on the page.
    pub discovered: usize,
    /// Candidates that created a new notebook record.
    pub created: usize,
    /// Candidates that refreshed an existing record.
    pub updated: usize,
    /// Content sync jobs enqueued (duplicates suppressed by the queue).
    pub enqueued: usize,
    /// Malformed items skipped by the search fetcher.
    pub skipped_items: usize,
    /// Total result count reported by the search API.
    pub total_count: u64,
}

pub struct IngestService {
    client: GithubClient,
    notebooks: NotebookRepository,
    repos: RepoRepository,
    users: UserRepository,
    queue: Arc<dyn JobQueue>,
}

impl IngestService {
    pub fn new(
        client: GithubClient,
        notebooks: NotebookRepository,
        repos: RepoRepository,
        users: UserRepository,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            client,
            notebooks,
            repos,
            users,
            queue,
        }
    }

    /// Fetch and ingest one search page.
    pub async fn ingest_page(&self, options: &SearchOptions) -> Result<IngestResult> {
        let outcome = search(&self.client, options).await?;

        let mut result = IngestResult {
            discovered: outcome.candidates.len(),
            skipped_items: outcome.skipped,
            total_count: outcome.total_count,
            ..IngestResult::default()
        };

        for candidate in outcome.candidates {
            let user = self
                .users
                .find_or_create(&candidate.owner_login, &candidate.owner_avatar_url)
                .await?;
            let repo = self
                .repos
                .find_or_create(&candidate.owner_login, &candidate.repo_name)
                .await?;

            let mut notebook = Notebook::new(
                candidate.owner_login,
                candidate.owner_avatar_url,
                candidate.repo_name,
                candidate.filename,
                candidate.html_url,
            );
            notebook.user_id = Some(user.id);
            notebook.repo_id = Some(repo.id);

            let (stored, created) = self.notebooks.upsert(&notebook).await?;
            if created {
                result.created += 1;
            } else {
                result.updated += 1;
            }

            match self.queue.enqueue(JobKind::ContentSync, &stored.id).await? {
                Enqueued::Queued(_) => result.enqueued += 1,
                Enqueued::Duplicate => {
                    debug!(notebook_id = %stored.id, "Content sync already queued");
                }
            }
        }

        info!(
            page = options.page,
            discovered = result.discovered,
            created = result.created,
            updated = result.updated,
            enqueued = result.enqueued,
            skipped = result.skipped_items,
            "Search page ingested"
        );
        Ok(result)
    }
}
