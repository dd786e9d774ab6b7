//! Content sync job: resolve and persist a notebook's raw content.
//!
//! Four sequential stages, each able to halt the run:
//!
//! 1. load the notebook with its user and repo; cancel on missing
//!    prerequisites, enqueue a repo sync when the default branch is unknown
//! 2. resolve the candidate raw URLs
//! 3. fetch content, default-branch URL first, commit-pinned URL as
//!    fallback; only 200 and 404 are meaningful answers
//! 4. persist content and canonical URL

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::{debug, info};

use super::{outcome, Halt, JobHandler, JobKind, JobOutcome, JobQueue, StepResult};
use crate::github::client::GithubClient;
use crate::github::urls::{self, RawUrls};
use crate::models::{content_digest, title_from_content, Notebook, Repo};
use crate::repository::NotebookRepository;

/// Content fetched in stage three.
#[derive(Debug)]
struct Fetched {
    content: String,
    /// Present only when the default-branch URL served the content; the
    /// commit-pinned URL is not canonical and is never stored as `url`.
    canonical_url: Option<String>,
}

struct Loaded {
    notebook: Notebook,
    repo: Repo,
}

pub struct ContentSyncJob {
    notebooks: NotebookRepository,
    client: GithubClient,
    queue: Arc<dyn JobQueue>,
}

impl ContentSyncJob {
    pub fn new(
        notebooks: NotebookRepository,
        client: GithubClient,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            notebooks,
            client,
            queue,
        }
    }

    pub async fn sync(&self, notebook_id: &str) -> JobOutcome {
        outcome(self.run(notebook_id).await)
    }

    async fn run(&self, notebook_id: &str) -> StepResult<()> {
        let loaded = self.load(notebook_id).await?;
        let raw_urls = self.resolve_urls(&loaded)?;
        let fetched = self.fetch(&loaded.notebook, &raw_urls).await?;
        self.persist(&loaded.notebook, fetched).await
    }

    /// Stage one: load and validate prerequisites.
    async fn load(&self, notebook_id: &str) -> StepResult<Loaded> {
        let graph = self
            .notebooks
            .get_graph(notebook_id)
            .await
            .map_err(|e| Halt::Retry(anyhow!("failed to load notebook {notebook_id}: {e}")))?;

        let Some(graph) = graph else {
            return Err(Halt::Cancelled(format!(
                "notebook {notebook_id} no longer exists"
            )));
        };
        if graph.user.is_none() {
            return Err(Halt::Cancelled(format!(
                "notebook {notebook_id} has no associated user"
            )));
        }
        let Some(repo) = graph.repo else {
            return Err(Halt::Cancelled(format!(
                "notebook {notebook_id} has no associated repository"
            )));
        };

        if repo.default_branch.is_none() {
            // Dependency chaining: repo sync will re-enqueue this notebook
            // once the branch is known. Never block waiting for it.
            self.queue
                .enqueue(JobKind::RepoSync, &repo.id)
                .await
                .map_err(|e| {
                    Halt::Retry(anyhow!(
                        "failed to enqueue repo sync for {}: {e}",
                        repo.full_name()
                    ))
                })?;
            return Err(Halt::Cancelled(format!(
                "repo {} has no default branch; repo sync enqueued",
                repo.full_name()
            )));
        }

        Ok(Loaded {
            notebook: graph.notebook,
            repo,
        })
    }

    /// Stage two: compute the candidate raw URLs.
    fn resolve_urls(&self, loaded: &Loaded) -> StepResult<RawUrls> {
        let nb = &loaded.notebook;
        let raw_urls = urls::resolve(
            &nb.owner_login,
            &nb.repo_name,
            &nb.filename,
            loaded.repo.default_branch.as_deref(),
            &nb.html_url,
        );

        if raw_urls.is_empty() {
            return Err(Halt::Cancelled(format!(
                "notebook {}: no resolvable raw content urls",
                nb.id
            )));
        }

        Ok(raw_urls)
    }

    /// Stage three: fetch content, default-branch URL first.
    async fn fetch(&self, notebook: &Notebook, raw_urls: &RawUrls) -> StepResult<Fetched> {
        if let Some(default_url) = &raw_urls.default_branch_url {
            let response = self
                .client
                .fetch_raw(default_url)
                .await
                .map_err(|e| Halt::Retry(e.into()))?;

            match response.status.as_u16() {
                200 => {
                    debug!(notebook_id = %notebook.id, url = %default_url, "Fetched from default branch");
                    return Ok(Fetched {
                        content: response.body,
                        canonical_url: Some(default_url.clone()),
                    });
                }
                404 => {} // fall through to the commit-pinned URL
                status => {
                    return Err(Halt::Retry(anyhow!(
                        "GET {default_url} returned HTTP {status}"
                    )));
                }
            }
        }

        let Some(commit_url) = &raw_urls.commit_url else {
            return Err(Halt::Cancelled("raw_commit_url is nil".to_string()));
        };

        let response = self
            .client
            .fetch_raw(commit_url)
            .await
            .map_err(|e| Halt::Retry(e.into()))?;

        match response.status.as_u16() {
            200 => {
                debug!(notebook_id = %notebook.id, url = %commit_url, "Fetched from commit url");
                Ok(Fetched {
                    content: response.body,
                    canonical_url: None,
                })
            }
            // Both URLs are gone: the document was deleted or moved upstream
            404 => Err(Halt::Cancelled(format!(
                "notebook {}: content gone upstream (404 on both raw urls)",
                notebook.id
            ))),
            status => Err(Halt::Retry(anyhow!(
                "GET {commit_url} returned HTTP {status}"
            ))),
        }
    }

    /// Stage four: persist content and canonical URL unconditionally.
    async fn persist(&self, notebook: &Notebook, fetched: Fetched) -> StepResult<()> {
        let title = title_from_content(&notebook.filename, &fetched.content);
        let digest = content_digest(&fetched.content);

        self.notebooks
            .update_content(
                &notebook.id,
                &fetched.content,
                fetched.canonical_url.as_deref(),
                &title,
                &digest,
            )
            .await
            .map_err(|e| {
                Halt::Retry(anyhow!(
                    "failed to persist notebook {} (url {:?}, title {:?}, {} bytes): {e}",
                    notebook.id,
                    fetched.canonical_url,
                    title,
                    fetched.content.len(),
                ))
            })?;

        info!(
            notebook_id = %notebook.id,
            canonical = fetched.canonical_url.is_some(),
            bytes = fetched.content.len(),
            "Notebook content synced"
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for ContentSyncJob {
    fn kind(&self) -> JobKind {
        JobKind::ContentSync
    }

    async fn execute(&self, key: &str) -> JobOutcome {
        self.sync(key).await
    }
}
