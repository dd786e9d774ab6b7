//! Domain models for notebooks, repositories, and users.
//!
//! These are the in-memory representations used by services and jobs.
//! Database record types live in `repository::models` and convert into
//! these via `From` impls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A discovered Livebook notebook.
///
/// Uniquely identified by `(owner_login, repo_name, filename)`; re-ingesting
/// the same candidate updates the existing record instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    /// Owning user, resolved during ingestion.
    pub user_id: Option<String>,
    /// Repository the notebook lives in.
    pub repo_id: Option<String>,
    pub owner_login: String,
    pub owner_avatar_url: String,
    pub repo_name: String,
    pub filename: String,
    /// GitHub HTML URL as returned by the search API.
    pub html_url: String,
    /// Canonical raw-content URL. Only set when the default-branch URL
    /// served the content; commit-pinned URLs are not canonical.
    pub url: Option<String>,
    /// Raw notebook content, populated by the content sync job.
    pub content: Option<String>,
    /// Title derived from content.
    pub title: Option<String>,
    /// SHA-256 of the fetched content, for change diagnostics.
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notebook {
    pub fn new(
        owner_login: String,
        owner_avatar_url: String,
        repo_name: String,
        filename: String,
        html_url: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            repo_id: None,
            owner_login,
            owner_avatar_url,
            repo_name,
            filename,
            html_url,
            url: None,
            content: None,
            title: None,
            content_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A GitHub repository referenced by at least one notebook.
///
/// `default_branch` is unknown until a repo sync job resolves it; content
/// sync jobs for the repository's notebooks are cancelled-and-requeued
/// until then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: String,
    pub owner_login: String,
    pub name: String,
    pub default_branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repo {
    pub fn new(owner_login: String, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_login,
            name,
            default_branch: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// "owner/name" slug for logging.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_login, self.name)
    }
}

/// A GitHub user that owns notebooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(login: String, avatar_url: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            login,
            avatar_url,
            created_at: Utc::now(),
        }
    }
}

/// Derive a notebook title from its content.
///
/// Livebook notebooks are markdown, so the first ATX heading is the title.
/// Falls back to a humanized filename stem when no heading is present.
pub fn title_from_content(filename: &str, content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
        }
    }

    let stem = filename
        .rsplit('/')
        .next()
        .unwrap_or(filename)
        .trim_end_matches(".livemd");
    stem.replace(['_', '-'], " ").trim().to_string()
}

/// SHA-256 hex digest of notebook content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_heading() {
        let content = "# Data Wrangling with Explorer\n\n```elixir\nMix.install([])\n```";
        assert_eq!(
            title_from_content("wrangling.livemd", content),
            "Data Wrangling with Explorer"
        );
    }

    #[test]
    fn test_title_skips_leading_prose() {
        let content = "some preamble\n\n## Getting Started\n";
        assert_eq!(
            title_from_content("intro.livemd", content),
            "Getting Started"
        );
    }

    #[test]
    fn test_title_falls_back_to_filename() {
        assert_eq!(
            title_from_content("machine_learning-basics.livemd", "no headings here"),
            "machine learning basics"
        );
    }

    #[test]
    fn test_title_ignores_empty_heading() {
        let content = "#\n# Real Title\n";
        assert_eq!(title_from_content("x.livemd", content), "Real Title");
    }

    #[test]
    fn test_content_digest_is_stable() {
        assert_eq!(content_digest("abc"), content_digest("abc"));
        assert_ne!(content_digest("abc"), content_digest("abd"));
    }

    #[test]
    fn test_notebook_new_defaults() {
        let nb = Notebook::new(
            "jose".into(),
            "https://avatars.example/jose".into(),
            "livebooks".into(),
            "intro.livemd".into(),
            "https://github.com/jose/livebooks/blob/abc/intro.livemd".into(),
        );
        assert!(nb.user_id.is_none());
        assert!(nb.content.is_none());
        assert!(nb.url.is_none());
        assert!(!nb.id.is_empty());
    }
}
