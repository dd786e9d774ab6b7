//! Repo sync job behavior: branch resolution, idempotency, and the
//! explicit re-enqueue of content syncs.

mod common;

use std::sync::Arc;

use common::{seed_notebook, setup};
use nbharvest::jobs::{JobKind, JobOutcome, RepoSyncJob};

const REPO_API_URL: &str = "https://api.github.com/repos/jose/demos";

fn job(app: &common::TestApp) -> RepoSyncJob {
    RepoSyncJob::new(
        app.repos.clone(),
        app.notebooks.clone(),
        app.client.clone(),
        Arc::new(app.queue.clone()),
    )
}

#[tokio::test]
async fn resolves_branch_and_enqueues_content_syncs() {
    let app = setup().await;
    let (_nb1, repo, _) = seed_notebook(
        &app,
        "jose",
        "demos",
        "intro.livemd",
        "https://github.com/jose/demos/blob/aaaaaaaa/intro.livemd",
        None,
        true,
    )
    .await;
    let (_nb2, _, _) = seed_notebook(
        &app,
        "jose",
        "demos",
        "advanced.livemd",
        "https://github.com/jose/demos/blob/bbbbbbbb/advanced.livemd",
        None,
        true,
    )
    .await;

    app.http
        .route(REPO_API_URL, 200, r#"{"default_branch": "main"}"#);

    let outcome = job(&app).sync(&repo.id).await;
    assert!(matches!(outcome, JobOutcome::Synced), "{outcome:?}");

    let stored = app.repos.get(&repo.id).await.unwrap().unwrap();
    assert_eq!(stored.default_branch.as_deref(), Some("main"));

    // One content sync per notebook of the repo
    let content_jobs = app.queue.live_jobs(JobKind::ContentSync).await.unwrap();
    assert_eq!(content_jobs.len(), 2);
}

#[tokio::test]
async fn rerunning_is_idempotent() {
    let app = setup().await;
    let (_nb, repo, _) = seed_notebook(
        &app,
        "jose",
        "demos",
        "intro.livemd",
        "https://github.com/jose/demos/blob/aaaaaaaa/intro.livemd",
        None,
        true,
    )
    .await;

    app.http
        .route(REPO_API_URL, 200, r#"{"default_branch": "main"}"#);

    let first = job(&app).sync(&repo.id).await;
    assert!(matches!(first, JobOutcome::Synced));
    let after_first = app.repos.get(&repo.id).await.unwrap().unwrap();

    let second = job(&app).sync(&repo.id).await;
    assert!(matches!(second, JobOutcome::Synced));
    let after_second = app.repos.get(&repo.id).await.unwrap().unwrap();

    assert_eq!(after_first.default_branch, after_second.default_branch);
    // The dedup window keeps the re-enqueue from duplicating live jobs
    let content_jobs = app.queue.live_jobs(JobKind::ContentSync).await.unwrap();
    assert_eq!(content_jobs.len(), 1);
}

#[tokio::test]
async fn upstream_404_is_cancelled_without_mutation() {
    let app = setup().await;
    let (_nb, repo, _) = seed_notebook(
        &app,
        "jose",
        "demos",
        "intro.livemd",
        "https://github.com/jose/demos/blob/aaaaaaaa/intro.livemd",
        None,
        true,
    )
    .await;

    app.http.route(REPO_API_URL, 404, "Not Found");

    let outcome = job(&app).sync(&repo.id).await;
    match outcome {
        JobOutcome::Cancelled(reason) => {
            assert!(reason.contains("jose/demos"));
            assert!(reason.contains("no longer exists upstream"));
        }
        other => panic!("expected cancelled, got {other:?}"),
    }

    let stored = app.repos.get(&repo.id).await.unwrap().unwrap();
    assert!(stored.default_branch.is_none());
    assert!(app.queue.live_jobs(JobKind::ContentSync).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_error_is_retryable() {
    let app = setup().await;
    let (_nb, repo, _) = seed_notebook(
        &app,
        "jose",
        "demos",
        "intro.livemd",
        "https://github.com/jose/demos/blob/aaaaaaaa/intro.livemd",
        None,
        true,
    )
    .await;

    app.http.route(REPO_API_URL, 500, "boom");

    let outcome = job(&app).sync(&repo.id).await;
    assert!(matches!(outcome, JobOutcome::Retryable(_)), "{outcome:?}");
}

#[tokio::test]
async fn malformed_metadata_is_retryable() {
    let app = setup().await;
    let (_nb, repo, _) = seed_notebook(
        &app,
        "jose",
        "demos",
        "intro.livemd",
        "https://github.com/jose/demos/blob/aaaaaaaa/intro.livemd",
        None,
        true,
    )
    .await;

    app.http.route(REPO_API_URL, 200, "<html>not json</html>");

    let outcome = job(&app).sync(&repo.id).await;
    assert!(matches!(outcome, JobOutcome::Retryable(_)), "{outcome:?}");
}

#[tokio::test]
async fn missing_repo_is_cancelled() {
    let app = setup().await;

    let outcome = job(&app).sync("no-such-repo").await;
    match outcome {
        JobOutcome::Cancelled(reason) => assert!(reason.contains("no longer exists")),
        other => panic!("expected cancelled, got {other:?}"),
    }
    assert_eq!(app.http.total_calls(), 0);
}
