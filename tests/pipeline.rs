//! End-to-end pipeline: ingest → content sync blocked on repo metadata →
//! repo sync → re-triggered content sync → persisted content.

mod common;

use std::sync::Arc;

use common::setup;
use nbharvest::github::{SearchOptions, SortOrder};
use nbharvest::jobs::{ContentSyncJob, JobQueue, RepoSyncJob, WorkerPool};
use nbharvest::services::IngestService;

const SEARCH_URL: &str =
    "https://api.github.com/search/code?q=extension%3Alivemd&page=1&per_page=30&sort=indexed&order=desc";
const REPO_API_URL: &str = "https://api.github.com/repos/jose/demos";
const DEFAULT_URL: &str = "https://raw.githubusercontent.com/jose/demos/main/intro.livemd";

#[tokio::test]
async fn discovered_notebook_ends_up_with_content() {
    let app = setup().await;

    let search_body = serde_json::json!({
        "total_count": 1,
        "items": [{
            "name": "intro.livemd",
            "html_url": "https://github.com/jose/demos/blob/3c38329d9e9e7a95011118e9974dfa40af28a714/intro.livemd",
            "repository": {
                "name": "demos",
                "private": false,
                "fork": false,
                "owner": {"login": "jose", "avatar_url": "https://avatars.example/jose"}
            }
        }]
    });
    app.http.route(SEARCH_URL, 200, &search_body.to_string());
    app.http
        .route(REPO_API_URL, 200, r#"{"default_branch": "main"}"#);
    app.http
        .route(DEFAULT_URL, 200, "# Intro\n\nHello Livebook.");

    // Discover
    let queue: Arc<dyn JobQueue> = Arc::new(app.queue.clone());
    let ingest = IngestService::new(
        app.client.clone(),
        app.notebooks.clone(),
        app.repos.clone(),
        app.users.clone(),
        queue.clone(),
    );
    let options = SearchOptions {
        page: 1,
        per_page: 30,
        order: SortOrder::Desc,
        query: None,
    };
    let result = ingest.ingest_page(&options).await.unwrap();
    assert_eq!(result.created, 1);

    // Enrich: the first content sync cancels itself and chains a repo sync,
    // which re-enqueues a fresh content sync that then succeeds.
    let mut pool = WorkerPool::new(app.queue.clone(), 1);
    pool.register(Arc::new(ContentSyncJob::new(
        app.notebooks.clone(),
        app.client.clone(),
        queue.clone(),
    )));
    pool.register(Arc::new(RepoSyncJob::new(
        app.repos.clone(),
        app.notebooks.clone(),
        app.client.clone(),
        queue,
    )));
    let processed = pool.drain().await;
    assert_eq!(processed, 3);

    let repo = app
        .repos
        .get_by_full_name("jose", "demos")
        .await
        .unwrap()
        .unwrap();
    let ids = app.notebooks.ids_for_repo(&repo.id).await.unwrap();
    assert_eq!(ids.len(), 1);

    let notebook = app.notebooks.get(&ids[0]).await.unwrap().unwrap();
    assert_eq!(notebook.content.as_deref(), Some("# Intro\n\nHello Livebook."));
    assert_eq!(notebook.url.as_deref(), Some(DEFAULT_URL));
    assert_eq!(notebook.title.as_deref(), Some("Intro"));

    assert_eq!(repo.default_branch.as_deref(), Some("main"));

    let stats = app.queue.stats().await.unwrap();
    assert_eq!(stats.done, 2);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.queued, 0);
}
