//! GitHub API surface: HTTP client, search fetcher, and URL resolution.

pub mod client;
pub mod rate_limiter;
pub mod search;
pub mod urls;

pub use client::{FetchedResponse, GithubClient, HttpClient, HttpError, HttpFetch};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use search::{search, Candidate, SearchError, SearchOptions, SearchOutcome, SortOrder};
pub use urls::RawUrls;
