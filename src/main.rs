//! nbharvest CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nbharvest::config::{Config, Settings};
use nbharvest::github::{GithubClient, HttpClient, SearchOptions, SortOrder};
use nbharvest::jobs::{ContentSyncJob, RepoSyncJob, SqliteJobQueue, WorkerPool};
use nbharvest::repository::pool::create_pool;
use nbharvest::repository::{migrations, NotebookRepository, RepoRepository, UserRepository};
use nbharvest::services::{IngestService, SweepService};

#[derive(Parser)]
#[command(name = "nbh", version, about = "Livebook notebook discovery and indexing")]
struct Cli {
    /// Data directory override
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    Asc,
    Desc,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => SortOrder::Asc,
            Order::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Search GitHub for notebooks and enqueue content syncs
    Ingest {
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// First page to fetch
        #[arg(long, default_value_t = 1)]
        start_page: u32,
        /// Search query override
        #[arg(long)]
        query: Option<String>,
        /// Sort order over the index date
        #[arg(long, value_enum, default_value_t = Order::Desc)]
        order: Order,
    },
    /// Run background workers until interrupted
    Worker {
        /// Worker count override
        #[arg(long)]
        workers: Option<usize>,
        /// Process due jobs once and exit
        #[arg(long)]
        drain: bool,
    },
    /// Run a content sync for one notebook
    SyncNotebook { id: String },
    /// Run a repo sync for one repository
    SyncRepo { id: String },
    /// Re-enqueue notebooks with unresolved content
    Sweep {
        #[arg(long, default_value_t = 500)]
        limit: u32,
    },
    /// Show database statistics
    Stats,
}

/// Shared handles built from settings.
struct App {
    notebooks: NotebookRepository,
    repos: RepoRepository,
    users: UserRepository,
    client: GithubClient,
    queue: SqliteJobQueue,
    settings: Settings,
}

impl App {
    async fn build(settings: Settings) -> Result<Self> {
        settings.ensure_directories()?;

        let pool = create_pool(&settings.database_path())?;
        migrations::run_migrations(pool.clone()).await?;

        let http = HttpClient::with_user_agent(
            settings.timeout(),
            settings.request_delay(),
            settings.user_agent.as_deref(),
        );
        let client = GithubClient::new(Arc::new(http), settings.github_api_key.clone());

        Ok(Self {
            notebooks: NotebookRepository::new(pool.clone()),
            repos: RepoRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            client,
            queue: SqliteJobQueue::with_config(pool, settings.queue_config()),
            settings,
        })
    }

    fn worker_pool(&self, workers: usize) -> WorkerPool {
        let queue: Arc<dyn nbharvest::jobs::JobQueue> = Arc::new(self.queue.clone());
        let mut pool = WorkerPool::new(self.queue.clone(), workers);
        pool.register(Arc::new(ContentSyncJob::new(
            self.notebooks.clone(),
            self.client.clone(),
            queue.clone(),
        )));
        pool.register(Arc::new(RepoSyncJob::new(
            self.repos.clone(),
            self.notebooks.clone(),
            self.client.clone(),
            queue,
        )));
        pool
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    if let Some(ref dir) = cli.data_dir {
        settings.data_dir = PathBuf::from(shellexpand::tilde(dir).as_ref());
    }

    let app = App::build(settings).await?;

    match cli.command {
        Command::Ingest {
            pages,
            start_page,
            query,
            order,
        } => {
            let ingest = IngestService::new(
                app.client.clone(),
                app.notebooks.clone(),
                app.repos.clone(),
                app.users.clone(),
                Arc::new(app.queue.clone()),
            );

            let bar = ProgressBar::new(pages as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} pages {msg}")
                    .expect("valid progress template"),
            );

            let mut created = 0;
            let mut updated = 0;
            let mut enqueued = 0;
            for page in start_page..start_page + pages {
                let options = SearchOptions {
                    page,
                    per_page: app.settings.search_per_page,
                    order: order.into(),
                    query: query.clone().or_else(|| app.settings.search_query.clone()),
                };
                let result = ingest.ingest_page(&options).await?;
                created += result.created;
                updated += result.updated;
                enqueued += result.enqueued;
                bar.inc(1);
                bar.set_message(format!("{created} new"));

                if result.discovered == 0 {
                    break;
                }
            }
            bar.finish_and_clear();

            println!("Ingested: {created} created, {updated} updated, {enqueued} syncs enqueued");
        }
        Command::Worker { workers, drain } => {
            let pool = app.worker_pool(workers.unwrap_or(app.settings.workers));

            if drain {
                let processed = pool.drain().await;
                println!("Processed {processed} jobs");
            } else {
                let (shutdown_tx, _) = broadcast::channel(1);
                let signal_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Shutdown signal received");
                        let _ = signal_tx.send(());
                    }
                });
                pool.run(shutdown_tx).await;
            }
        }
        Command::SyncNotebook { id } => {
            let queue: Arc<dyn nbharvest::jobs::JobQueue> = Arc::new(app.queue.clone());
            let job = ContentSyncJob::new(app.notebooks.clone(), app.client.clone(), queue);
            let outcome = job.sync(&id).await;
            println!("{outcome:?}");
        }
        Command::SyncRepo { id } => {
            let queue: Arc<dyn nbharvest::jobs::JobQueue> = Arc::new(app.queue.clone());
            let job = RepoSyncJob::new(
                app.repos.clone(),
                app.notebooks.clone(),
                app.client.clone(),
                queue,
            );
            let outcome = job.sync(&id).await;
            println!("{outcome:?}");
        }
        Command::Sweep { limit } => {
            let sweep = SweepService::new(app.notebooks.clone(), Arc::new(app.queue.clone()));
            let result = sweep.run(limit).await?;
            println!(
                "Sweep: {} unresolved notebooks examined, {} syncs enqueued",
                result.examined, result.enqueued
            );
        }
        Command::Stats => {
            let notebooks = app.notebooks.count().await?;
            let with_content = app.notebooks.count_with_content().await?;
            let repos = app.repos.count().await?;
            let jobs = app.queue.stats().await?;

            println!("Notebooks: {notebooks} ({with_content} with content)");
            println!("Repos:     {repos}");
            println!(
                "Jobs:      {} queued, {} executing, {} done, {} cancelled, {} failed",
                jobs.queued, jobs.executing, jobs.done, jobs.cancelled, jobs.failed
            );
        }
    }

    Ok(())
}
