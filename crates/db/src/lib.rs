//! Database layer with `SeaORM` entities, repositories and migrations.
//!
//! This crate provides:
//! - Connection setup from [`DatabaseConfig`]
//! - The `migrations` ledger entity and its repository
//! - Discovery and application of SQL migration files

pub mod entities;
pub mod migration;
pub mod repositories;

pub use migration::{MigrationError, MigrationRunner, MigrationSource, RunnerOptions};
pub use repositories::LedgerRepository;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use trackpoint_shared::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the configured limits.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);
    Database::connect(options).await
}
