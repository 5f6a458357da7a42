use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use forage_client::{
    NewsletterCollector, PacedFetcher, PacingConfig, PageFetcher, VideoCollector,
};
use forage_core::health::{HealthConfig, SourceHealth};
use forage_core::models::SourceType;
use forage_core::orchestrator::CollectionOrchestrator;
use forage_core::retry::RetryPolicy;
use forage_core::traits::SystemClock;
use forage_db::{ContentRepository, Database, DatabaseConfig, SourceStatusRepository};

#[derive(Parser)]
#[command(name = "forage", version, about = "Resilient multi-source content collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection cycle across all registered sources
    Run {
        /// Consecutive failures before a source is skipped
        #[arg(long, env = "FORAGE_FAILURE_THRESHOLD", default_value_t = 5)]
        failure_threshold: u32,

        /// Hours an unhealthy source stays skipped
        #[arg(long, env = "FORAGE_RECOVERY_HOURS", default_value_t = 24)]
        recovery_hours: i64,

        /// Allow fetching private/reserved addresses (local testing)
        #[arg(long, default_value_t = false)]
        allow_private_urls: bool,
    },

    /// Show the current health snapshot across all sources
    Status {
        #[arg(long, env = "FORAGE_FAILURE_THRESHOLD", default_value_t = 5)]
        failure_threshold: u32,

        #[arg(long, env = "FORAGE_RECOVERY_HOURS", default_value_t = 24)]
        recovery_hours: i64,
    },

    /// Register sources from a JSON file
    Register {
        /// Path to a JSON list of { "source_id", "source_type" } entries
        #[arg(short, long)]
        sources: PathBuf,
    },

    /// Reset all source failure counters (manual recovery)
    ResetHealth,
}

/// One entry in a source registration file.
#[derive(Debug, Deserialize)]
struct SourceSpec {
    source_id: String,
    source_type: SourceType,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = connect_db().await?;

    match cli.command {
        Commands::Run {
            failure_threshold,
            recovery_hours,
            allow_private_urls,
        } => {
            let orch = build_orchestrator(&db, failure_threshold, recovery_hours, allow_private_urls)?;
            let report = orch.run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.success {
                anyhow::bail!("collection run degraded by an internal failure");
            }
        }
        Commands::Status {
            failure_threshold,
            recovery_hours,
        } => {
            let health = build_health(&db, failure_threshold, recovery_hours);
            let sweep = health.check_all_sources().await?;
            println!("{}", serde_json::to_string_pretty(&sweep)?);
        }
        Commands::Register { sources } => {
            let health = build_health(&db, 5, 24);
            let registered = cmd_register(&health, &sources).await?;
            eprintln!("Registered {registered} new source(s)");
        }
        Commands::ResetHealth => {
            let health = build_health(&db, 5, 24);
            let summary = health.reset_all_failures().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().context("Database configuration missing")?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;
    Ok(db)
}

fn build_health(
    db: &Database,
    failure_threshold: u32,
    recovery_hours: i64,
) -> SourceHealth<SourceStatusRepository, SystemClock> {
    SourceHealth::new(
        db.status_repo(),
        SystemClock,
        HealthConfig {
            failure_threshold,
            recovery_hours,
        },
    )
}

fn build_orchestrator(
    db: &Database,
    failure_threshold: u32,
    recovery_hours: i64,
    allow_private_urls: bool,
) -> Result<
    CollectionOrchestrator<
        SourceStatusRepository,
        SystemClock,
        NewsletterCollector<PacedFetcher<PageFetcher>, ContentRepository>,
        VideoCollector<PacedFetcher<PageFetcher>, ContentRepository>,
    >,
> {
    let mut fetcher = PageFetcher::new()?;
    if allow_private_urls {
        fetcher = fetcher.allow_private_urls();
    }
    let fetcher = PacedFetcher::new(fetcher, PacingConfig::default());
    let retry = RetryPolicy::default();

    let newsletters =
        NewsletterCollector::new(fetcher.clone(), db.content_repo(), retry.clone());
    let videos = VideoCollector::new(fetcher, db.content_repo(), retry);
    let health = build_health(db, failure_threshold, recovery_hours);

    Ok(CollectionOrchestrator::new(health, newsletters, videos))
}

/// Register every source listed in the file; existing records are left
/// untouched.
async fn cmd_register(
    health: &SourceHealth<SourceStatusRepository, SystemClock>,
    path: &Path,
) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let specs: Vec<SourceSpec> =
        serde_json::from_str(&raw).context("Source file must be a JSON list of sources")?;

    let mut registered = 0usize;
    for spec in specs {
        if health
            .register_source(&spec.source_id, spec.source_type)
            .await?
        {
            registered += 1;
        }
    }
    Ok(registered)
}
