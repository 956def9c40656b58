//! dirsyncd - directory sync daemon
//!
//! One binary, several roles:
//! - `scheduler`: keeps one incremental-sync timer per eligible connector
//!   and follows connector changes
//! - `worker`: claims sync tasks and runs them against the directory
//! - `enqueue`: manual trigger for a connector
//! - `migrate`: applies the embedded database migrations

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dirsync_connector::crypto::CredentialCipher;
use dirsync_connector_ldap::{DirectoryClient, DirectorySyncEngine, LdapDialer};
use dirsync_core::{ConnectorId, QueueMessage, TaskKind};
use dirsync_db::{
    run_migrations, DbPool, PgChangeFeed, PgConnectorStore, PgTaskQueue, PgUserStore,
};
use dirsync_scheduler::SyncScheduler;
use dirsync_worker::{SyncWorker, TaskExecutor};

mod config;
mod logging;

use config::Config;

/// Directory sync daemon
#[derive(Parser)]
#[command(name = "dirsyncd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule incremental syncs and follow connector changes
    Scheduler,

    /// Claim and run sync tasks
    Worker,

    /// Enqueue a task for one connector
    Enqueue(EnqueueArgs),

    /// Apply database migrations
    Migrate,
}

#[derive(Args)]
struct EnqueueArgs {
    /// Connector id
    #[arg(long)]
    connector: u64,

    /// Task kind: full-sync, incremental-sync or terminate
    #[arg(long, default_value = "full-sync")]
    kind: TaskKind,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting dirsyncd");

    let result = match cli.command {
        Commands::Scheduler => run_scheduler(&config).await,
        Commands::Worker => run_worker(&config).await,
        Commands::Enqueue(args) => enqueue(&config, args).await,
        Commands::Migrate => migrate(&config).await,
    };

    if let Err(e) = result {
        error!("dirsyncd failed: {e:#}");
        std::process::exit(1);
    }
}

async fn connect(config: &Config) -> anyhow::Result<DbPool> {
    DbPool::connect_with(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")
}

async fn run_scheduler(config: &Config) -> anyhow::Result<()> {
    let pool = connect(config).await?;

    // Listen before bootstrapping so changes made during bootstrap are not lost.
    let mut feed = PgChangeFeed::connect(&pool, &config.change_feed_channel)
        .await
        .context("Failed to subscribe to connector changes")?;

    let scheduler = SyncScheduler::new(
        Arc::new(PgConnectorStore::new(pool.clone())),
        Arc::new(PgTaskQueue::new(pool.clone())),
    );

    let report = scheduler
        .bootstrap()
        .await
        .context("Failed to bootstrap scheduler")?;
    if !report.is_clean() {
        warn!(
            installed = report.installed,
            failed = report.failures.len(),
            "Some connectors were not scheduled"
        );
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let result = scheduler.run_change_feed(&mut feed, &cancel).await;
    scheduler.shutdown();
    pool.close().await;
    result.context("Connector change feed failed")
}

async fn run_worker(config: &Config) -> anyhow::Result<()> {
    let cipher = CredentialCipher::from_key_string(&config.encryption_key)
        .context("Invalid CONNECTOR_ENCRYPTION_KEY")?;
    let pool = connect(config).await?;

    let dialer = LdapDialer::new().with_tls_skip_verify(config.directory_tls_skip_verify);
    let client = Arc::new(DirectoryClient::new(Arc::new(dialer), config.pool_config()));
    let engine = DirectorySyncEngine::new(
        client.clone(),
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(cipher),
    );

    let queue = Arc::new(PgTaskQueue::new(pool.clone()));
    let executor = Arc::new(TaskExecutor::new(
        Arc::new(PgConnectorStore::new(pool.clone())),
        Arc::new(engine),
        queue.clone(),
    ));
    let worker = Arc::new(SyncWorker::new(queue, executor, config.worker_config()));

    tokio::spawn({
        let worker = worker.clone();
        async move {
            shutdown_signal().await;
            worker.shutdown();
        }
    });

    worker.run().await;
    client.close_all().await;
    pool.close().await;
    Ok(())
}

async fn enqueue(config: &Config, args: EnqueueArgs) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let queue = PgTaskQueue::new(pool.clone());
    let message = QueueMessage::new(ConnectorId::new(args.connector), args.kind);

    let handle = dirsync_queue::submit(&queue, &message)
        .await
        .with_context(|| format!("Failed to enqueue {} for connector {}", args.kind, args.connector))?;
    info!(queue = %handle.queue, task_id = %handle.task_id, "Task enqueued");

    pool.close().await;
    Ok(())
}

async fn migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    pool.close().await;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
