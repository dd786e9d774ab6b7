//! Embedded schema migrations.
//!
//! The schema is small enough to ship as a single idempotent batch of
//! `CREATE TABLE IF NOT EXISTS` statements, applied on startup.

use diesel::connection::SimpleConnection;

use super::pool::{run_blocking, DieselError, SqlitePool};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    avatar_url TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repos (
    id TEXT PRIMARY KEY,
    owner_login TEXT NOT NULL,
    name TEXT NOT NULL,
    default_branch TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (owner_login, name)
);

CREATE TABLE IF NOT EXISTS notebooks (
    id TEXT PRIMARY KEY,
    user_id TEXT REFERENCES users (id),
    repo_id TEXT REFERENCES repos (id),
    owner_login TEXT NOT NULL,
    owner_avatar_url TEXT NOT NULL,
    repo_name TEXT NOT NULL,
    filename TEXT NOT NULL,
    html_url TEXT NOT NULL,
    url TEXT,
    content TEXT,
    title TEXT,
    content_hash TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (owner_login, repo_name, filename)
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    run_at TEXT NOT NULL,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notebooks_repo_id ON notebooks (repo_id);
CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs (state, run_at);
CREATE INDEX IF NOT EXISTS idx_jobs_dedup ON jobs (kind, key, state);
"#;

/// Apply the schema to the database behind the pool.
pub async fn run_migrations(pool: SqlitePool) -> Result<(), DieselError> {
    run_blocking(pool, |conn| {
        conn.batch_execute(SCHEMA_SQL)?;
        Ok(())
    })
    .await
}
