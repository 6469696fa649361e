//! Command line entry point for the skill demand service.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use skillgap_aggregation::{AggregationService, SqliteRepository};
use skillgap_api::{build_router, ApiConfig, AppState};
use skillgap_db::DbPool;
use skillgap_ingestion::{CsvScraper, HttpScraper, RefreshCoordinator, RefreshMode, Scraper};
use skillgap_telemetry::{init_logging, Metrics};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "skillgap")]
#[command(about = "Skill demand API over scraped job posting counts")]
struct Cli {
    /// Log level filter (e.g. "info", "skillgap_api=debug"); defaults to RUST_LOG
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// HTTP bind address
        #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:3000")]
        bind_address: String,

        /// Metrics bind address; metrics are not served when unset
        #[arg(long, env = "METRICS_BIND_ADDRESS")]
        metrics_bind_address: Option<String>,

        /// Shared secret expected as `Authorization: Bearer <secret>` on /api/scheduled-task
        #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
        cron_secret: Option<String>,

        /// Comma-separated CORS origin allow-list
        #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
        allowed_origins: Vec<String>,

        /// Per-query store timeout in seconds
        #[arg(long, env = "QUERY_TIMEOUT_SECONDS", default_value = "10")]
        query_timeout_seconds: u64,

        /// Read request timeout in seconds
        #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value = "30")]
        request_timeout_seconds: u64,

        #[command(flatten)]
        database: DatabaseArgs,

        #[command(flatten)]
        refresh: RefreshArgs,
    },
    /// Run one refresh and exit
    Refresh {
        #[command(flatten)]
        database: DatabaseArgs,

        #[command(flatten)]
        refresh: RefreshArgs,
    },
    /// Apply database migrations and exit
    Migrate {
        #[command(flatten)]
        database: DatabaseArgs,
    },
}

#[derive(Args)]
struct DatabaseArgs {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "skill_demand.db")]
    database_path: String,
}

#[derive(Args)]
struct RefreshArgs {
    /// CSV export to refresh from
    #[arg(long, env = "SOURCE_CSV", conflicts_with = "source_url")]
    source_csv: Option<PathBuf>,

    /// Collector endpoint serving a JSON snapshot
    #[arg(long, env = "SOURCE_URL")]
    source_url: Option<String>,

    /// How a refresh replaces stored data: staged or in-place
    #[arg(long, env = "REFRESH_MODE", default_value = "staged")]
    refresh_mode: RefreshMode,

    /// Upper bound on one scrape, in seconds
    #[arg(long, env = "SCRAPE_TIMEOUT_SECONDS", default_value = "300")]
    scrape_timeout_seconds: u64,

    /// HTTP request timeout for the collector, in seconds
    #[arg(long, env = "SOURCE_TIMEOUT_SECONDS", default_value = "60")]
    source_timeout_seconds: u64,

    /// Append a JSON line per refresh to this file
    #[arg(long, env = "SAMPLE_OUTPUT_PATH")]
    sample_output_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind_address,
            metrics_bind_address,
            cron_secret,
            allowed_origins,
            query_timeout_seconds,
            request_timeout_seconds,
            database,
            refresh,
        } => {
            let mut config = ApiConfig::default().with_cron_secret(cron_secret);
            if !allowed_origins.is_empty() {
                config.allowed_origins = allowed_origins;
            }
            config.request_timeout = Duration::from_secs(request_timeout_seconds);

            run_server(
                &bind_address,
                metrics_bind_address.as_deref(),
                config,
                Duration::from_secs(query_timeout_seconds),
                &database,
                &refresh,
            )
            .await?;
        }
        Commands::Refresh { database, refresh } => {
            run_refresh(&database, &refresh).await?;
        }
        Commands::Migrate { database } => {
            let db = DbPool::new(&database.database_path).await?;
            db.migrate().await?;
        }
    }

    Ok(())
}

async fn open_database(args: &DatabaseArgs) -> anyhow::Result<DbPool> {
    let db = DbPool::new(&args.database_path).await?;
    db.migrate().await?;
    Ok(db)
}

fn build_scraper(args: &RefreshArgs, metrics: &Metrics) -> anyhow::Result<Arc<dyn Scraper>> {
    match (&args.source_csv, &args.source_url) {
        (Some(path), None) => {
            info!("Refreshing from CSV {}", path.display());
            Ok(Arc::new(CsvScraper::new(path)))
        }
        (None, Some(url)) => {
            let scraper = HttpScraper::new(
                url,
                Duration::from_secs(args.source_timeout_seconds),
                metrics.clone(),
            )?;
            Ok(Arc::new(scraper))
        }
        _ => anyhow::bail!("exactly one of --source-csv or --source-url is required"),
    }
}

fn build_coordinator(
    db: &DbPool,
    args: &RefreshArgs,
    metrics: &Metrics,
) -> anyhow::Result<RefreshCoordinator> {
    let scraper = build_scraper(args, metrics)?;
    Ok(RefreshCoordinator::new(db.clone(), scraper, metrics.clone())
        .with_mode(args.refresh_mode)
        .with_scrape_timeout(Duration::from_secs(args.scrape_timeout_seconds))
        .with_sample_output(args.sample_output_path.clone()))
}

async fn run_server(
    bind_address: &str,
    metrics_addr: Option<&str>,
    config: ApiConfig,
    query_timeout: Duration,
    database: &DatabaseArgs,
    refresh: &RefreshArgs,
) -> anyhow::Result<()> {
    info!("Starting skill demand API");

    let db = open_database(database).await?;
    let metrics = Metrics::new()?;

    let aggregation = AggregationService::new(
        Arc::new(SqliteRepository::new(db.clone())),
        metrics.clone(),
    )
    .with_timeout(query_timeout);
    let coordinator = build_coordinator(&db, refresh, &metrics)?;
    info!("Refresh mode: {}", coordinator.mode());

    if let Some(addr) = metrics_addr {
        start_metrics_server(addr, metrics.clone()).await?;
    }

    let app = build_router(AppState::new(aggregation, Arc::new(coordinator), config));

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!("API listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API stopped");
    Ok(())
}

async fn run_refresh(database: &DatabaseArgs, refresh: &RefreshArgs) -> anyhow::Result<()> {
    let db = open_database(database).await?;
    let metrics = Metrics::new()?;
    let coordinator = build_coordinator(&db, refresh, &metrics)?;

    let outcome = coordinator.refresh().await?;
    info!(
        "Refresh finished: {} regions, {} skills, {} demand rows",
        outcome.counts.regions, outcome.counts.skills, outcome.counts.demand_rows
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn start_metrics_server(addr: &str, metrics: Metrics) -> anyhow::Result<()> {
    use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};

    async fn metrics_handler(
        State(metrics): State<Arc<Metrics>>,
    ) -> Result<impl IntoResponse, StatusCode> {
        match metrics.gather() {
            Ok(body) => Ok((StatusCode::OK, body)),
            Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(metrics));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}
