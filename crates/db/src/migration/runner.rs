//! Sequential, idempotent migration runner.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{error, info, warn};

use super::error::{MigrationError, MigrationResult};
use super::source::{MigrationFile, MigrationSource};
use crate::repositories::LedgerRepository;

/// Behavior switches for a runner.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Execute each script and insert its record in a single transaction.
    pub transactional: bool,
    /// Report pending migrations without executing or recording them.
    pub dry_run: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            transactional: true,
            dry_run: false,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Files applied by this run, in application order.
    pub applied: Vec<String>,
    /// Files a dry run would have applied.
    pub would_apply: Vec<String>,
    /// Number of files skipped because the ledger already held them.
    pub skipped: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// State of one migration as seen by [`MigrationRunner::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// Recorded in the ledger.
    Applied {
        /// When it was recorded.
        executed_at: DateTime<Utc>,
    },
    /// On disk, not yet recorded.
    Pending,
    /// Recorded in the ledger but no longer on disk.
    Missing {
        /// When it was recorded.
        executed_at: DateTime<Utc>,
    },
}

/// One row of a status listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migration file name.
    pub filename: String,
    /// Ledger state of the file.
    pub state: MigrationState,
}

/// Applies pending migration files to a database, once each, in file name order.
///
/// The runner holds everything it needs; there is no ambient connection or
/// process-wide state.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    ledger: LedgerRepository,
    source: MigrationSource,
    options: RunnerOptions,
}

impl MigrationRunner {
    /// Creates a runner over `db` reading files from `source`.
    #[must_use]
    pub fn new(db: DatabaseConnection, source: MigrationSource, options: RunnerOptions) -> Self {
        Self {
            ledger: LedgerRepository::new(db),
            source,
            options,
        }
    }

    /// Applies every migration the ledger does not yet hold.
    ///
    /// Stops at the first failure. Migrations applied before the failure stay
    /// applied and recorded; nothing is rolled back across files.
    ///
    /// # Errors
    ///
    /// Returns the first discovery, execution or ledger error encountered.
    pub async fn run(&self) -> MigrationResult<MigrationReport> {
        let started = Instant::now();

        self.ledger.ensure_table().await?;
        let files = self.source.discover().await?;
        let applied = self.ledger.applied_filenames().await?;

        warn_missing(&files, &applied);
        let newest_applied = applied.last().cloned();

        let mut report = MigrationReport::default();
        for file in &files {
            if applied.contains(&file.filename) {
                report.skipped += 1;
                continue;
            }

            if newest_applied
                .as_deref()
                .is_some_and(|newest| file.filename.as_str() < newest)
            {
                warn!(
                    filename = %file.filename,
                    newest_applied = newest_applied.as_deref().unwrap_or_default(),
                    "Applying migration out of order"
                );
            }

            if self.options.dry_run {
                info!(filename = %file.filename, "Would apply migration");
                report.would_apply.push(file.filename.clone());
                continue;
            }

            info!(filename = %file.filename, "Applying migration");
            if self.options.transactional {
                self.apply_in_transaction(file).await?;
            } else {
                self.apply_unguarded(file).await?;
            }
            report.applied.push(file.filename.clone());
        }

        report.elapsed = started.elapsed();
        info!(
            applied = report.applied.len(),
            pending = report.would_apply.len(),
            skipped = report.skipped,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Migrations complete"
        );
        Ok(report)
    }

    /// Lists every migration with its ledger state, ordered by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or the ledger read fails.
    pub async fn status(&self) -> MigrationResult<Vec<MigrationStatus>> {
        self.ledger.ensure_table().await?;
        let files = self.source.discover().await?;
        let records = self.ledger.records().await?;

        let on_disk: BTreeSet<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        let mut statuses: Vec<MigrationStatus> = files
            .iter()
            .map(|file| {
                let state = records
                    .iter()
                    .find(|r| r.filename == file.filename)
                    .map_or(MigrationState::Pending, |r| MigrationState::Applied {
                        executed_at: r.executed_at,
                    });
                MigrationStatus {
                    filename: file.filename.clone(),
                    state,
                }
            })
            .collect();

        statuses.extend(
            records
                .iter()
                .filter(|r| !on_disk.contains(r.filename.as_str()))
                .map(|r| MigrationStatus {
                    filename: r.filename.clone(),
                    state: MigrationState::Missing {
                        executed_at: r.executed_at,
                    },
                }),
        );
        statuses.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(statuses)
    }

    /// Returns the ledger this runner records into.
    #[must_use]
    pub const fn ledger(&self) -> &LedgerRepository {
        &self.ledger
    }

    async fn apply_in_transaction(&self, file: &MigrationFile) -> MigrationResult<()> {
        let txn_err = |source| MigrationError::Transaction {
            filename: file.filename.clone(),
            source,
        };

        let txn = self.ledger.connection().begin().await.map_err(txn_err)?;
        let outcome = async {
            execute_script(&txn, file).await?;
            LedgerRepository::record(&txn, &file.filename).await
        }
        .await;

        match outcome {
            Ok(()) => txn.commit().await.map_err(txn_err),
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    warn!(filename = %file.filename, error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn apply_unguarded(&self, file: &MigrationFile) -> MigrationResult<()> {
        let db = self.ledger.connection();
        execute_script(db, file).await?;
        LedgerRepository::record(db, &file.filename)
            .await
            .inspect_err(|err| {
                error!(
                    filename = %file.filename,
                    error = %err,
                    "Migration applied but not recorded; resolve manually before the next run"
                );
            })
    }
}

async fn execute_script<C>(conn: &C, file: &MigrationFile) -> MigrationResult<()>
where
    C: ConnectionTrait,
{
    if file.is_blank() {
        return Ok(());
    }
    conn.execute_unprepared(&file.contents)
        .await
        .map_err(|source| MigrationError::Execution {
            filename: file.filename.clone(),
            source,
        })?;
    Ok(())
}

fn warn_missing(files: &[MigrationFile], applied: &BTreeSet<String>) {
    for filename in applied {
        if !files.iter().any(|f| &f.filename == filename) {
            warn!(filename = %filename, "Recorded migration is missing from the migrations directory");
        }
    }
}
