//! Persistence layer for notebooks, repos, users, and the job queue.
//!
//! Built on sync Diesel over SQLite with r2d2 pooling; every operation is
//! wrapped in spawn_blocking via [`pool::run_blocking`].

pub mod migrations;
pub mod models;
pub mod notebook;
pub mod pool;
pub mod repo;
pub mod user;

pub use notebook::{NotebookGraph, NotebookRepository};
pub use repo::RepoRepository;
pub use user::UserRepository;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 timestamp column, falling back to now on bad data.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
