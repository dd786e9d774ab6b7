//! Diesel-based notebook repository for SQLite.

use chrono::Utc;
use diesel::prelude::*;

use super::models::{NewNotebook, NotebookRecord, RepoRecord, UserRecord};
use super::parse_datetime;
use super::pool::{run_blocking, DieselError, SqlitePool};
use crate::models::{Notebook, Repo, User};
use crate::schema::{notebooks, repos, users};

impl From<NotebookRecord> for Notebook {
    fn from(record: NotebookRecord) -> Self {
        Notebook {
            id: record.id,
            user_id: record.user_id,
            repo_id: record.repo_id,
            owner_login: record.owner_login,
            owner_avatar_url: record.owner_avatar_url,
            repo_name: record.repo_name,
            filename: record.filename,
            html_url: record.html_url,
            url: record.url,
            content: record.content,
            title: record.title,
            content_hash: record.content_hash,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// A notebook loaded together with its user and repo associations.
#[derive(Debug, Clone)]
pub struct NotebookGraph {
    pub notebook: Notebook,
    pub user: Option<User>,
    pub repo: Option<Repo>,
}

/// Diesel-based notebook repository with compile-time query checking.
#[derive(Clone)]
pub struct NotebookRepository {
    pool: SqlitePool,
}

impl NotebookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a notebook by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Notebook>, DieselError> {
        let id = id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            notebooks::table
                .find(&id)
                .select(NotebookRecord::as_select())
                .first::<NotebookRecord>(conn)
                .optional()
        })
        .await
        .map(|opt| opt.map(Notebook::from))
    }

    /// Get a notebook with its user and repo associations preloaded.
    pub async fn get_graph(&self, id: &str) -> Result<Option<NotebookGraph>, DieselError> {
        let id = id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let Some(record) = notebooks::table
                .find(&id)
                .select(NotebookRecord::as_select())
                .first::<NotebookRecord>(conn)
                .optional()?
            else {
                return Ok(None);
            };

            let user = match record.user_id.as_deref() {
                Some(uid) => users::table
                    .find(uid)
                    .select(UserRecord::as_select())
                    .first::<UserRecord>(conn)
                    .optional()?,
                None => None,
            };

            let repo = match record.repo_id.as_deref() {
                Some(rid) => repos::table
                    .find(rid)
                    .select(RepoRecord::as_select())
                    .first::<RepoRecord>(conn)
                    .optional()?,
                None => None,
            };

            Ok(Some(NotebookGraph {
                notebook: record.into(),
                user: user.map(User::from),
                repo: repo.map(Repo::from),
            }))
        })
        .await
    }

    /// Insert or update a notebook by its `(owner_login, repo_name, filename)`
    /// identity.
    ///
    /// Re-ingesting refreshes the attribution fields and `updated_at` but
    /// leaves previously fetched content/url untouched. Returns the stored
    /// notebook and whether it was newly created.
    pub async fn upsert(&self, notebook: &Notebook) -> Result<(Notebook, bool), DieselError> {
        let nb = notebook.clone();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            conn.immediate_transaction(|conn| {
                let now = Utc::now().to_rfc3339();

                let existing: Option<NotebookRecord> = notebooks::table
                    .filter(notebooks::owner_login.eq(&nb.owner_login))
                    .filter(notebooks::repo_name.eq(&nb.repo_name))
                    .filter(notebooks::filename.eq(&nb.filename))
                    .select(NotebookRecord::as_select())
                    .first::<NotebookRecord>(conn)
                    .optional()?;

                let created = existing.is_none();

                match existing {
                    Some(record) => {
                        diesel::update(notebooks::table.find(&record.id))
                            .set((
                                notebooks::owner_avatar_url.eq(&nb.owner_avatar_url),
                                notebooks::html_url.eq(&nb.html_url),
                                notebooks::user_id.eq(nb.user_id.as_deref()),
                                notebooks::repo_id.eq(nb.repo_id.as_deref()),
                                notebooks::updated_at.eq(&now),
                            ))
                            .execute(conn)?;
                    }
                    None => {
                        let created_at = nb.created_at.to_rfc3339();
                        diesel::insert_into(notebooks::table)
                            .values(NewNotebook {
                                id: &nb.id,
                                user_id: nb.user_id.as_deref(),
                                repo_id: nb.repo_id.as_deref(),
                                owner_login: &nb.owner_login,
                                owner_avatar_url: &nb.owner_avatar_url,
                                repo_name: &nb.repo_name,
                                filename: &nb.filename,
                                html_url: &nb.html_url,
                                url: None,
                                content: None,
                                title: None,
                                content_hash: None,
                                created_at: &created_at,
                                updated_at: &now,
                            })
                            .execute(conn)?;
                    }
                }

                let stored: NotebookRecord = notebooks::table
                    .filter(notebooks::owner_login.eq(&nb.owner_login))
                    .filter(notebooks::repo_name.eq(&nb.repo_name))
                    .filter(notebooks::filename.eq(&nb.filename))
                    .select(NotebookRecord::as_select())
                    .first(conn)?;

                Ok((Notebook::from(stored), created))
            })
        })
        .await
    }

    /// Persist fetched content and the canonical URL for a notebook.
    pub async fn update_content(
        &self,
        id: &str,
        content: &str,
        url: Option<&str>,
        title: &str,
        content_hash: &str,
    ) -> Result<(), DieselError> {
        let id = id.to_string();
        let content = content.to_string();
        let url = url.map(|u| u.to_string());
        let title = title.to_string();
        let content_hash = content_hash.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let now = Utc::now().to_rfc3339();
            diesel::update(notebooks::table.find(&id))
                .set((
                    notebooks::content.eq(&content),
                    notebooks::url.eq(url.as_deref()),
                    notebooks::title.eq(&title),
                    notebooks::content_hash.eq(&content_hash),
                    notebooks::updated_at.eq(&now),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// IDs of all notebooks belonging to a repository.
    pub async fn ids_for_repo(&self, repo_id: &str) -> Result<Vec<String>, DieselError> {
        let repo_id = repo_id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            notebooks::table
                .filter(notebooks::repo_id.eq(&repo_id))
                .select(notebooks::id)
                .load::<String>(conn)
        })
        .await
    }

    /// IDs of notebooks whose content has not been resolved yet.
    pub async fn unresolved_ids(&self, limit: u32) -> Result<Vec<String>, DieselError> {
        let limit = limit as i64;
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            notebooks::table
                .filter(notebooks::content.is_null())
                .order(notebooks::created_at.asc())
                .limit(limit)
                .select(notebooks::id)
                .load::<String>(conn)
        })
        .await
    }

    /// Count all notebooks.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            use diesel::dsl::count_star;
            let count: i64 = notebooks::table.select(count_star()).first(conn)?;
            Ok(count as u64)
        })
        .await
    }

    /// Count notebooks with resolved content.
    pub async fn count_with_content(&self) -> Result<u64, DieselError> {
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            use diesel::dsl::count_star;
            let count: i64 = notebooks::table
                .filter(notebooks::content.is_not_null())
                .select(count_star())
                .first(conn)?;
            Ok(count as u64)
        })
        .await
    }
}
