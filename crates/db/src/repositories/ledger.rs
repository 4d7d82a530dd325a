//! Migration ledger repository.
//!
//! The ledger is the `migrations` table: one row per applied migration file,
//! keyed by a unique file name.

use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::sea_query::{ColumnDef, Expr, Table};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryOrder, QuerySelect, Set, SqlErr,
};

use crate::entities::migrations;
use crate::migration::{MigrationError, MigrationResult};

/// Repository over the migrations ledger table.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the ledger table unless it already exists.
    ///
    /// Safe to run repeatedly and from several processes at once; the store's
    /// `IF NOT EXISTS` handling is the only guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_table(&self) -> MigrationResult<()> {
        let stmt = Table::create()
            .table(migrations::Entity)
            .if_not_exists()
            .col(
                ColumnDef::new(migrations::Column::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(migrations::Column::Filename)
                    .string_len(255)
                    .not_null()
                    .unique_key(),
            )
            .col(
                ColumnDef::new(migrations::Column::ExecutedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();

        let backend = self.db.get_database_backend();
        self.db
            .execute(backend.build(&stmt))
            .await
            .map_err(MigrationError::Ledger)?;
        Ok(())
    }

    /// Returns every recorded file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn applied_filenames(&self) -> MigrationResult<BTreeSet<String>> {
        let filenames: Vec<String> = migrations::Entity::find()
            .select_only()
            .column(migrations::Column::Filename)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(MigrationError::Ledger)?;
        Ok(filenames.into_iter().collect())
    }

    /// Returns every ledger record, ordered by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn records(&self) -> MigrationResult<Vec<migrations::Model>> {
        migrations::Entity::find()
            .order_by_asc(migrations::Column::Filename)
            .all(&self.db)
            .await
            .map_err(MigrationError::Ledger)
    }

    /// Inserts the record for `filename` on `conn`.
    ///
    /// `conn` is usually the transaction that executed the migration, so the
    /// script and its record commit together.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::AlreadyRecorded`] if the file name is already
    /// in the ledger, or [`MigrationError::Record`] for any other failure.
    pub async fn record<C>(conn: &C, filename: &str) -> MigrationResult<()>
    where
        C: ConnectionTrait,
    {
        let record = migrations::ActiveModel {
            filename: Set(filename.to_string()),
            executed_at: Set(Utc::now()),
            ..Default::default()
        };

        migrations::Entity::insert(record)
            .exec_without_returning(conn)
            .await
            .map(|_| ())
            .map_err(|source| record_error(filename, source))
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn record_error(filename: &str, source: DbErr) -> MigrationError {
    if matches!(source.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        MigrationError::AlreadyRecorded {
            filename: filename.to_string(),
        }
    } else {
        MigrationError::Record {
            filename: filename.to_string(),
            source,
        }
    }
}
