//! Search fetcher for discovering notebooks via the GitHub code-search API.
//!
//! One call fetches one page of candidates. Persistence and job enqueueing
//! are the caller's concern (see `services::ingest`), keeping this module
//! free of side effects beyond the HTTP request itself.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use super::client::{GithubClient, HttpError};

/// Default code-search query: every Livebook notebook on GitHub.
pub const DEFAULT_QUERY: &str = "extension:livemd";

/// Sort direction over the index date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Options for one search page.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Page number, 1-based.
    pub page: u32,
    pub per_page: u32,
    pub order: SortOrder,
    /// Free-text query; `DEFAULT_QUERY` when absent.
    pub query: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 30,
            order: SortOrder::Desc,
            query: None,
        }
    }
}

/// A normalized search-result item, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub owner_login: String,
    pub owner_avatar_url: String,
    pub repo_name: String,
    pub filename: String,
    pub html_url: String,
}

/// Result of one search page.
#[derive(Debug)]
pub struct SearchOutcome {
    pub candidates: Vec<Candidate>,
    pub total_count: u64,
    /// Items dropped because required fields were missing or malformed.
    pub skipped: usize,
    /// Effective request URL, for diagnostics.
    pub request_url: String,
    /// Raw response body as parsed JSON, for diagnostics.
    pub raw: serde_json::Value,
}

/// Field-keyed validation errors, e.g. `{"github_api_key": ["is missing"]}`.
pub type ValidationErrors = HashMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Configuration problem detected before any network call.
    #[error("validation failed: {0:?}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("search API returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("failed to parse search response: {0}")]
    Parse(#[from] serde_json::Error),
}

// Response shape, permissive on purpose: every field an item needs can be
// absent without failing the whole page.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: Option<String>,
    html_url: Option<String>,
    repository: Option<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    private: bool,
    #[serde(default)]
    #[allow(dead_code)]
    fork: bool,
    owner: Option<OwnerPayload>,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: Option<String>,
    avatar_url: Option<String>,
}

/// Fetch one page of notebook candidates.
///
/// Fails with a validation error (and zero network calls) when no API
/// credential is configured.
pub async fn search(
    client: &GithubClient,
    options: &SearchOptions,
) -> Result<SearchOutcome, SearchError> {
    if client.api_key().is_none() {
        let mut errors = ValidationErrors::new();
        errors.insert("github_api_key".to_string(), vec!["is missing".to_string()]);
        return Err(SearchError::Validation(errors));
    }

    let query = options.query.as_deref().unwrap_or(DEFAULT_QUERY);
    let request_url = format!(
        "{}/search/code?q={}&page={}&per_page={}&sort=indexed&order={}",
        client.api_base(),
        urlencoding::encode(query),
        options.page.max(1),
        options.per_page,
        options.order.as_str(),
    );

    let response = client.get_api(&request_url).await?;
    if !response.is_success() {
        return Err(SearchError::Status {
            status: response.status.as_u16(),
            body: response.body,
        });
    }

    let raw: serde_json::Value = serde_json::from_str(&response.body)?;
    let parsed: SearchResponse = serde_json::from_value(raw.clone())?;

    let mut candidates = Vec::with_capacity(parsed.items.len());
    let mut skipped = 0;
    for item in parsed.items {
        match normalize_item(item) {
            Some(candidate) => candidates.push(candidate),
            None => {
                skipped += 1;
                warn!(page = options.page, "Skipping malformed search item");
            }
        }
    }

    Ok(SearchOutcome {
        candidates,
        total_count: parsed.total_count,
        skipped,
        request_url,
        raw,
    })
}

/// Map one search item into a candidate, tolerating missing fields.
fn normalize_item(item: SearchItem) -> Option<Candidate> {
    let filename = item.name?;
    let html_url = item.html_url?;
    let repository = item.repository?;
    let repo_name = repository.name?;
    let owner = repository.owner?;
    let owner_login = owner.login?;

    Some(Candidate {
        owner_login,
        owner_avatar_url: owner.avatar_url.unwrap_or_default(),
        repo_name,
        filename,
        html_url,
    })
}
