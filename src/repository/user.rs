//! Diesel-based user repository for SQLite.

use diesel::prelude::*;

use super::models::{NewUser, UserRecord};
use super::parse_datetime;
use super::pool::{run_blocking, DieselError, SqlitePool};
use crate::models::User;
use crate::schema::users;

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            login: record.login,
            avatar_url: record.avatar_url,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// Diesel-based user repository with compile-time query checking.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> Result<Option<User>, DieselError> {
        let id = id.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            users::table
                .find(&id)
                .select(UserRecord::as_select())
                .first::<UserRecord>(conn)
                .optional()
        })
        .await
        .map(|opt| opt.map(User::from))
    }

    /// Find a user by login, creating it if absent.
    pub async fn find_or_create(&self, login: &str, avatar_url: &str) -> Result<User, DieselError> {
        let login = login.to_string();
        let avatar_url = avatar_url.to_string();
        let pool = self.pool.clone();

        run_blocking(pool, move |conn| {
            let now = chrono::Utc::now().to_rfc3339();
            let id = uuid::Uuid::new_v4().to_string();

            diesel::insert_into(users::table)
                .values(NewUser {
                    id: &id,
                    login: &login,
                    avatar_url: &avatar_url,
                    created_at: &now,
                })
                .on_conflict(users::login)
                .do_nothing()
                .execute(conn)?;

            let record: UserRecord = users::table
                .filter(users::login.eq(&login))
                .select(UserRecord::as_select())
                .first(conn)?;

            Ok(User::from(record))
        })
        .await
    }
}
