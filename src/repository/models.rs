//! Diesel ORM models for database tables.
//!
//! These models provide compile-time type checking for database operations.
//! SQLite operations are wrapped in spawn_blocking since diesel-async does
//! not support SQLite.

use diesel::prelude::*;

use crate::schema;

/// Notebook record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::notebooks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NotebookRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub repo_id: Option<String>,
    pub owner_login: String,
    pub owner_avatar_url: String,
    pub repo_name: String,
    pub filename: String,
    pub html_url: String,
    pub url: Option<String>,
    pub content: Option<String>,
    pub title: Option<String>,
    pub content_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New notebook for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::notebooks)]
pub struct NewNotebook<'a> {
    pub id: &'a str,
    pub user_id: Option<&'a str>,
    pub repo_id: Option<&'a str>,
    pub owner_login: &'a str,
    pub owner_avatar_url: &'a str,
    pub repo_name: &'a str,
    pub filename: &'a str,
    pub html_url: &'a str,
    pub url: Option<&'a str>,
    pub content: Option<&'a str>,
    pub title: Option<&'a str>,
    pub content_hash: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Repo record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::repos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RepoRecord {
    pub id: String,
    pub owner_login: String,
    pub name: String,
    pub default_branch: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New repo for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::repos)]
pub struct NewRepo<'a> {
    pub id: &'a str,
    pub owner_login: &'a str,
    pub name: &'a str,
    pub default_branch: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// User record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRecord {
    pub id: String,
    pub login: String,
    pub avatar_url: String,
    pub created_at: String,
}

/// New user for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub login: &'a str,
    pub avatar_url: &'a str,
    pub created_at: &'a str,
}

/// Job record from the queue table.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRecord {
    pub id: i32,
    pub kind: String,
    pub key: String,
    pub state: String,
    pub attempts: i32,
    pub run_at: String,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New job for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::jobs)]
pub struct NewJob<'a> {
    pub kind: &'a str,
    pub key: &'a str,
    pub state: &'a str,
    pub attempts: i32,
    pub run_at: &'a str,
    pub last_error: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
