//! Migration error types.

use std::path::PathBuf;

use sea_orm::DbErr;
use thiserror::Error;

/// Result type alias using `MigrationError`.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors raised while discovering, applying or recording migrations.
///
/// Every variant is fatal to the run it occurs in.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory could not be listed.
    #[error("cannot read migrations directory {}", dir.display())]
    Discovery {
        /// Directory that was being listed.
        dir: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A migration file could not be read.
    #[error("cannot read migration file {}", path.display())]
    Read {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A migration file name is not valid UTF-8 and cannot serve as a ledger key.
    #[error("migration file name is not valid UTF-8: {}", path.display())]
    InvalidFilename {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// A name given for a new migration produces no usable file name.
    #[error("invalid migration name {0:?}")]
    InvalidName(String),

    /// A new migration file would overwrite an existing one.
    #[error("migration file already exists: {}", path.display())]
    AlreadyExists {
        /// Path that already exists.
        path: PathBuf,
    },

    /// The ledger table could not be created or read.
    #[error("migration ledger unavailable")]
    Ledger(#[source] DbErr),

    /// A migration script failed to execute.
    #[error("migration {filename} failed")]
    Execution {
        /// File whose contents failed.
        filename: String,
        /// Database error reported for the script.
        #[source]
        source: DbErr,
    },

    /// The ledger record for a migration could not be written.
    #[error("failed to record migration {filename}")]
    Record {
        /// File that could not be recorded.
        filename: String,
        /// Database error reported for the insert.
        #[source]
        source: DbErr,
    },

    /// The ledger already holds this filename; another runner applied it concurrently.
    #[error("migration {filename} is already recorded in the ledger")]
    AlreadyRecorded {
        /// File that was recorded twice.
        filename: String,
    },

    /// A per-migration transaction could not be opened or committed.
    #[error("transaction for migration {filename} failed")]
    Transaction {
        /// File the transaction belonged to.
        filename: String,
        /// Database error reported for begin/commit.
        #[source]
        source: DbErr,
    },
}

/// Coarse classification of a [`MigrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Reading the directory or a file failed; nothing was executed.
    Discovery,
    /// A script failed against the database.
    Execution,
    /// The ledger could not be created, read or written.
    Ledger,
}

impl MigrationError {
    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Discovery { .. }
            | Self::Read { .. }
            | Self::InvalidFilename { .. }
            | Self::InvalidName(_)
            | Self::AlreadyExists { .. } => ErrorKind::Discovery,
            Self::Execution { .. } | Self::Transaction { .. } => ErrorKind::Execution,
            Self::Ledger(_) | Self::Record { .. } | Self::AlreadyRecorded { .. } => {
                ErrorKind::Ledger
            }
        }
    }

    /// Returns the migration file this error concerns, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Execution { filename, .. }
            | Self::Record { filename, .. }
            | Self::AlreadyRecorded { filename }
            | Self::Transaction { filename, .. } => Some(filename),
            _ => None,
        }
    }
}
