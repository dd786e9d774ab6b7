//! Diesel-based repo repository for SQLite.

use chrono::Utc;
use diesel::prelude::*;

use super::models::{NewRepo, RepoRecord};
use super::parse_datetime;
use super::pool::{run_blocking, DieselError, SqlitePool};
use crate::models::Repo;
use crate::schema::repos;

impl From<RepoRecord> for Repo {
    fn from(record: RepoRecord) -> Self {
        Repo {
            id: record.id,
            owner_login: record.owner_login,
            name: record.name,
            default_branch: record.default_branch,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Diesel-based repo repository with compile-time query checking.
#[derive(Clone)]
pub struct RepoRepository {
    pool: SqlitePool,
}

impl RepoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a repo by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Repo>, DieselError> {
        let id = id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            repos::table
                .find(&id)
                .select(RepoRecord::as_select())
                .first::<RepoRecord>(conn)
                .optional()
        })
        .await
        .map(|opt| opt.map(Repo::from))
    }

    /// Get a repo by its `(owner_login, name)` identity.
    pub async fn get_by_full_name(
        &self,
        owner_login: &str,
        name: &str,
    ) -> Result<Option<Repo>, DieselError> {
        let owner_login = owner_login.to_string();
        let name = name.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            repos::table
                .filter(repos::owner_login.eq(&owner_login))
                .filter(repos::name.eq(&name))
                .select(RepoRecord::as_select())
                .first::<RepoRecord>(conn)
                .optional()
        })
        .await
        .map(|opt| opt.map(Repo::from))
    }

    /// Find a repo by `(owner_login, name)`, creating it if absent.
    ///
    /// Concurrent callers racing on the same identity converge on one row;
    /// the unique index arbitrates and the loser reloads the winner's row.
    pub async fn find_or_create(&self, owner_login: &str, name: &str) -> Result<Repo, DieselError> {
        let owner_login = owner_login.to_string();
        let name = name.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let now = Utc::now().to_rfc3339();
            let id = uuid::Uuid::new_v4().to_string();

            diesel::insert_into(repos::table)
                .values(NewRepo {
                    id: &id,
                    owner_login: &owner_login,
                    name: &name,
                    default_branch: None,
                    created_at: &now,
                    updated_at: &now,
                })
                .on_conflict((repos::owner_login, repos::name))
                .do_nothing()
                .execute(conn)?;

            let record: RepoRecord = repos::table
                .filter(repos::owner_login.eq(&owner_login))
                .filter(repos::name.eq(&name))
                .select(RepoRecord::as_select())
                .first(conn)?;

            Ok(Repo::from(record))
        })
        .await
    }

    /// Overwrite the default branch from the authoritative upstream value.
    pub async fn set_default_branch(&self, id: &str, branch: &str) -> Result<(), DieselError> {
        let id = id.to_string();
        let branch = branch.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let now = Utc::now().to_rfc3339();
            diesel::update(repos::table.find(&id))
                .set((
                    repos::default_branch.eq(&branch),
                    repos::updated_at.eq(&now),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Count all repos.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            use diesel::dsl::count_star;
            let count: i64 = repos::table.select(count_star()).first(conn)?;
            Ok(count as u64)
        })
        .await
    }
}
