//! nbharvest — Livebook notebook discovery and indexing.
//!
//! Discovers `.livemd` notebooks published on GitHub via the code-search
//! API, persists them, and enriches each record asynchronously: a queue of
//! idempotent background jobs resolves repository default branches and
//! fetches raw notebook content with a two-URL fallback.

pub mod config;
pub mod github;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
