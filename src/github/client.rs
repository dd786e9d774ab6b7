//! HTTP client for the GitHub API and raw-content hosts.
//!
//! All fetching goes through the [`HttpFetch`] trait so jobs and the search
//! fetcher can be exercised against scripted responses in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use super::rate_limiter::RateLimiter;

const USER_AGENT: &str = "nbharvest/0.3 (notebook indexing; github.com/nbharvest/nbharvest)";

/// Default base URL for the GitHub REST API.
pub const API_BASE: &str = "https://api.github.com";

/// Transport-level failure. Anything in here is transient from the caller's
/// point of view; HTTP status handling happens on [`FetchedResponse`].
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else {
            HttpError::Connection(err.to_string())
        }
    }
}

/// A fully-read HTTP response envelope.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Minimal GET interface implemented by the real client and test doubles.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<FetchedResponse, HttpError>;
}

/// HTTP client with per-host adaptive rate limiting.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(timeout: Duration, request_delay: Duration) -> Self {
        Self::with_user_agent(timeout, request_delay, None)
    }

    /// Create a new HTTP client with a custom user agent.
    pub fn with_user_agent(
        timeout: Duration,
        request_delay: Duration,
        user_agent: Option<&str>,
    ) -> Self {
        let client = Client::builder()
            .user_agent(user_agent.unwrap_or(USER_AGENT))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            request_delay,
            rate_limiter: RateLimiter::new(),
        }
    }

    /// Get the rate limiter for this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<FetchedResponse, HttpError> {
        // Wait for the rate limiter before making the request
        let domain = self.rate_limiter.acquire(url).await;

        let mut request = self.client.get(url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        let mut response_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(name.to_string(), v.to_string());
            }
        }

        // Report status to the rate limiter for adaptive backoff
        if let Some(ref domain) = domain {
            let code = status.as_u16();
            if code == 429 || code == 503 {
                self.rate_limiter.report_rate_limit(domain, code).await;
            } else if code >= 500 {
                self.rate_limiter.report_server_error(domain).await;
            } else if status.is_success() || code == 404 {
                // 404 is a meaningful answer, not a server problem
                self.rate_limiter.report_success(domain).await;
            }
        }

        let body = response.text().await?;

        debug!(url, status = status.as_u16(), bytes = body.len(), "GET");

        // Base delay between requests; the limiter adds adaptive delay on top
        tokio::time::sleep(self.request_delay).await;

        Ok(FetchedResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// Typed access to the GitHub endpoints nbharvest consumes.
#[derive(Clone)]
pub struct GithubClient {
    http: Arc<dyn HttpFetch>,
    api_base: String,
    api_key: Option<String>,
}

impl GithubClient {
    pub fn new(http: Arc<dyn HttpFetch>, api_key: Option<String>) -> Self {
        Self {
            http,
            api_base: API_BASE.to_string(),
            api_key,
        }
    }

    /// Override the API base URL (tests, GitHub Enterprise).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn api_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "Accept".to_string(),
            "application/vnd.github+json".to_string(),
        )];
        if let Some(key) = &self.api_key {
            headers.push(("Authorization".to_string(), format!("token {key}")));
        }
        headers
    }

    /// GET an API URL with auth headers applied.
    pub async fn get_api(&self, url: &str) -> Result<FetchedResponse, HttpError> {
        self.http.get(url, self.api_headers()).await
    }

    /// Fetch repository metadata (`GET /repos/:owner/:name`).
    pub async fn fetch_repo(
        &self,
        owner_login: &str,
        name: &str,
    ) -> Result<FetchedResponse, HttpError> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner_login, name);
        self.get_api(&url).await
    }

    /// Plain GET against a raw-content URL (no auth).
    pub async fn fetch_raw(&self, url: &str) -> Result<FetchedResponse, HttpError> {
        self.http.get(url, Vec::new()).await
    }
}
