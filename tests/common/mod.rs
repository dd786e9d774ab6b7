//! Shared test harness: scripted HTTP transport and a temp-database app.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use nbharvest::github::{FetchedResponse, GithubClient, HttpError, HttpFetch};
use nbharvest::jobs::{QueueConfig, SqliteJobQueue};
use nbharvest::models::{Notebook, Repo, User};
use nbharvest::repository::migrations::run_migrations;
use nbharvest::repository::pool::{create_pool_from_url, SqlitePool};
use nbharvest::repository::{NotebookRepository, RepoRepository, UserRepository};

/// Scripted transport: fixed responses per URL, every call recorded.
pub struct RoutedHttp {
    routes: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<Vec<String>>,
}

impl RoutedHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn route(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpFetch for RoutedHttp {
    async fn get(
        &self,
        url: &str,
        _headers: Vec<(String, String)>,
    ) -> Result<FetchedResponse, HttpError> {
        self.calls.lock().unwrap().push(url.to_string());

        let route = self.routes.lock().unwrap().get(url).cloned();
        match route {
            Some((status, body)) => Ok(FetchedResponse {
                status: StatusCode::from_u16(status).expect("valid status code"),
                headers: Default::default(),
                body,
            }),
            // Unrouted URLs behave like a network failure
            None => Err(HttpError::Connection(format!("no route for {url}"))),
        }
    }
}

/// Everything a test needs, backed by a temp SQLite database.
pub struct TestApp {
    pub pool: SqlitePool,
    pub notebooks: NotebookRepository,
    pub repos: RepoRepository,
    pub users: UserRepository,
    pub queue: SqliteJobQueue,
    pub http: Arc<RoutedHttp>,
    pub client: GithubClient,
    _dir: tempfile::TempDir,
}

pub async fn setup() -> TestApp {
    setup_with_queue_config(QueueConfig::default()).await
}

pub async fn setup_with_queue_config(config: QueueConfig) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let pool = create_pool_from_url(&db_path.display().to_string()).expect("Failed to open pool");
    run_migrations(pool.clone()).await.expect("Failed to migrate");

    let http = RoutedHttp::new();
    let client = GithubClient::new(http.clone(), Some("test-key".to_string()));

    TestApp {
        notebooks: NotebookRepository::new(pool.clone()),
        repos: RepoRepository::new(pool.clone()),
        users: UserRepository::new(pool.clone()),
        queue: SqliteJobQueue::with_config(pool.clone(), config),
        http,
        client,
        pool,
        _dir: dir,
    }
}

/// Persist a user + repo + notebook graph and return the stored rows.
///
/// `default_branch`: None leaves the repo unresolved; `with_user`: false
/// stores the notebook without attribution.
pub async fn seed_notebook(
    app: &TestApp,
    owner: &str,
    repo_name: &str,
    filename: &str,
    html_url: &str,
    default_branch: Option<&str>,
    with_user: bool,
) -> (Notebook, Repo, User) {
    let user = app
        .users
        .find_or_create(owner, &format!("https://avatars.example/{owner}"))
        .await
        .unwrap();
    let repo = app.repos.find_or_create(owner, repo_name).await.unwrap();
    if let Some(branch) = default_branch {
        app.repos.set_default_branch(&repo.id, branch).await.unwrap();
    }

    let mut notebook = Notebook::new(
        owner.to_string(),
        format!("https://avatars.example/{owner}"),
        repo_name.to_string(),
        filename.to_string(),
        html_url.to_string(),
    );
    notebook.user_id = with_user.then(|| user.id.clone());
    notebook.repo_id = Some(repo.id.clone());

    let (stored, _created) = app.notebooks.upsert(&notebook).await.unwrap();
    let repo = app.repos.get(&repo.id).await.unwrap().unwrap();
    (stored, repo, user)
}
