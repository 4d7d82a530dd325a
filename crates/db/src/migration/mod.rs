//! Database migrations.
//!
//! Migrations are `.sql` files in one directory, applied in file name order
//! and recorded in the `migrations` ledger table:
//! - [`MigrationSource`] finds and reads the files
//! - [`MigrationRunner`] applies the pending ones, one transaction each
//! - [`MigrationError`] covers every way a run can stop

pub mod error;
pub mod runner;
pub mod source;

#[cfg(test)]
mod source_props;

pub use error::{ErrorKind, MigrationError, MigrationResult};
pub use runner::{MigrationReport, MigrationRunner, MigrationState, MigrationStatus, RunnerOptions};
pub use source::{MigrationFile, MigrationSource, select_migrations};
