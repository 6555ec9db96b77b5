//! Stockroom Background CLI

use std::{path::PathBuf, process};

use clap::{Args, Parser, Subcommand};
use stockroom_app::{
    cdc::{CdcPublisher, PgLogicalSlotSource},
    context::{AppConfig, AppContext},
    database,
    settings::Settings,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stockroom-app", about = "Stockroom background processes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Consume the cart cleanup, order timeout, seckill and cart cache queues
    Worker(ConnectArgs),

    /// Forward cart row changes from the replication slot to the broker
    Cdc(ConnectArgs),

    /// Apply pending database migrations
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
struct ConnectArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Maximum pooled database connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// Redis connection string; an in-process cache is used when omitted
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// AMQP connection string; an in-process broker is used when omitted
    #[arg(long, env = "AMQP_URL")]
    amqp_url: Option<String>,

    /// YAML settings file; built-in defaults are used when omitted
    #[arg(long, env = "STOCKROOM_SETTINGS")]
    settings: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
pub async fn main() {
    let _env = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(message) = run(cli).await {
        error!("{message}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Worker(args) => worker(args).await,
        Commands::Cdc(args) => cdc(args).await,
        Commands::Migrate(args) => migrate(args).await,
    }
}

async fn open(args: ConnectArgs) -> Result<AppContext, String> {
    let settings = match &args.settings {
        Some(path) => Settings::load(path)
            .map_err(|error| format!("failed to load settings {}: {error}", path.display()))?,
        None => Settings::default(),
    };

    AppContext::open(AppConfig {
        database_url: args.database_url,
        max_connections: args.max_connections,
        redis_url: args.redis_url,
        amqp_url: args.amqp_url,
        run_migrations: false,
        settings,
    })
    .await
    .map_err(|error| format!("failed to start: {error}"))
}

async fn worker(args: ConnectArgs) -> Result<(), String> {
    let context = open(args).await?;
    let shutdown = shutdown_token();
    let tracker = TaskTracker::new();

    for consumer in context.consumers() {
        tracker.spawn(consumer.run(shutdown.clone()));
    }

    tracker.close();

    info!(consumers = tracker.len(), "worker started");

    tracker.wait().await;
    context.close().await;

    info!("worker stopped");

    Ok(())
}

async fn cdc(args: ConnectArgs) -> Result<(), String> {
    let context = open(args).await?;
    let settings = context.settings.cdc.clone();

    let source = PgLogicalSlotSource::new(context.db.pool().clone(), settings.slot.clone());

    let created = source
        .ensure_slot()
        .await
        .map_err(|error| format!("failed to prepare replication slot: {error}"))?;

    info!(slot = %settings.slot, created, "replication slot ready");

    let publisher = CdcPublisher::new(
        std::sync::Arc::new(source),
        context.broker.clone(),
        settings,
    );

    publisher.run(shutdown_token()).await;
    context.close().await;

    Ok(())
}

async fn migrate(args: MigrateArgs) -> Result<(), String> {
    let pool = database::connect(&args.database_url, 1)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

    database::migrate(&pool)
        .await
        .map_err(|error| format!("failed to apply migrations: {error}"))?;

    info!("migrations applied");

    Ok(())
}

/// A token cancelled on Ctrl+C or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested");
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(source) => {
            error!(error = %source, "failed to install SIGTERM handler");

            if let Err(source) = tokio::signal::ctrl_c().await {
                error!(error = %source, "failed to listen for Ctrl+C");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(source) = tokio::signal::ctrl_c().await {
        error!(error = %source, "failed to listen for Ctrl+C");
    }
}
