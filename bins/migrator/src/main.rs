//! Database migration runner for Trackpoint.
//!
//! Usage:
//!   migrator [up] [--dry-run]  - Apply all pending migrations (default)
//!   migrator status            - Show applied, pending and missing migrations
//!   migrator new <NAME>        - Create an empty, timestamped migration file
//!
//! Exits with status 0 on success and 1 on any failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use trackpoint_db::migration::{MigrationState, MigrationStatus};
use trackpoint_db::{MigrationRunner, MigrationSource, RunnerOptions, connect_with};
use trackpoint_shared::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "migrator", version, about = "Apply Trackpoint SQL migrations")]
struct Cli {
    /// Directory holding the migration files.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Database URL; overrides DATABASE_URL and the config files.
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Run each migration outside a transaction.
    #[arg(long, global = true, default_value_t = false)]
    no_transaction: bool,
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Apply every pending migration in file name order.
    Up {
        /// List what would be applied without touching the database schema.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Show every migration and whether it has been applied.
    Status,
    /// Create a new, empty migration file.
    New {
        /// Short description, turned into the file name.
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Printed as well as logged: RUST_LOG may filter out the event.
            let message = failure_message(&err);
            error!(error = %message, "Migration run failed");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "migrator=info,trackpoint_db=info,sea_orm=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = apply_overrides(
        AppConfig::load().context("failed to load configuration")?,
        &cli,
    );
    let source = MigrationSource::new(
        config.migrations.dir.clone(),
        config.migrations.extension.clone(),
    );

    let command = cli.command.unwrap_or(Command::Up { dry_run: false });
    if let Command::New { name } = &command {
        config.migrations.validate()?;
        let path = source.create(name, Utc::now()).await?;
        println!("{}", path.display());
        return Ok(());
    }

    config.validate()?;
    let db = connect_with(&config.database)
        .await
        .context("failed to connect to database")?;
    info!(dir = %source.dir().display(), "Connected to database");

    let dry_run = matches!(command, Command::Up { dry_run: true });
    let runner = MigrationRunner::new(
        db,
        source,
        RunnerOptions {
            transactional: config.migrations.transactional,
            dry_run,
        },
    );

    if command == Command::Status {
        for status in runner.status().await? {
            println!("{}", format_status(&status));
        }
        return Ok(());
    }

    let report = runner.run().await?;
    if report.applied.is_empty() && report.would_apply.is_empty() {
        info!("No pending migrations");
    }
    for filename in &report.would_apply {
        println!("pending  {filename}");
    }
    Ok(())
}

/// Applies command-line flags on top of loaded configuration.
fn apply_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(dir) = &cli.dir {
        config.migrations.dir.clone_from(dir);
    }
    if let Some(url) = &cli.database_url {
        config.database.url.clone_from(url);
    }
    if cli.no_transaction {
        config.migrations.transactional = false;
    }
    config
}

/// One-line failure text with the full error chain.
fn failure_message(err: &anyhow::Error) -> String {
    format!("error: {err:#}")
}

fn format_status(status: &MigrationStatus) -> String {
    match &status.state {
        MigrationState::Applied { executed_at } => format!(
            "applied  {}  {}",
            executed_at.format("%Y-%m-%d %H:%M:%S"),
            status.filename
        ),
        MigrationState::Pending => format!("pending  {:19}  {}", "", status.filename),
        MigrationState::Missing { executed_at } => format!(
            "missing  {}  {}",
            executed_at.format("%Y-%m-%d %H:%M:%S"),
            status.filename
        ),
    }
}
