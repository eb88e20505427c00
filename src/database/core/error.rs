//! Error types for the catalog store
//!
//! Three layers of errors are used:
//! - [`StatementError`]: structural misuse of the SQL builder, raised before any I/O
//! - [`StoreError`]: anything a store primitive can fail with; the mapping proxy
//!   passes these through unchanged
//! - [`StoreOpenError`]: the single typed channel through which an open request fails

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Builder misuse, detected before any statement reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    #[error("insert into '{table}' sets no columns")]
    EmptyInsert { table: String },

    #[error("update of '{table}' sets no columns")]
    EmptyUpdate { table: String },

    #[error("table '{table}' declares no columns")]
    EmptyTable { table: String },

    #[error("alter table '{table}' requests no change")]
    EmptyAlter { table: String },

    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),

    #[error("conflict algorithm code {0} is out of range (0..=5)")]
    InvalidConflictAlgorithm(i32),

    #[error("IN predicate on '{column}' has no values")]
    EmptyInList { column: String },
}

/// Failure of a credential cryptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cryptor error: {0}")]
pub struct CryptorError(pub String);

/// Failure of a settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors produced by store primitives.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("column '{0}' is not part of the result set")]
    MissingColumn(String),

    #[error("column '{column}' holds {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("query cancelled")]
    Cancelled,

    #[error("statement has been closed")]
    StatementClosed,

    #[error(transparent)]
    Cryptor(#[from] CryptorError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl StoreError {
    /// Whether a migration step that declares a recovery may attempt it.
    ///
    /// Only generic SQL errors qualify: a table that already exists, a column
    /// that is duplicated or missing. These are what an interrupted earlier run
    /// leaves behind. Corruption, I/O, locking and constraint errors never do.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // prepare-time failures arrive as SqlInputError, step-time ones as
            // SqliteFailure; both carry the engine's primary code
            StoreError::Sqlite(err) => err.sqlite_error_code() == Some(ErrorCode::Unknown),
            _ => false,
        }
    }
}

/// Why a chain could not be built or a path could not be found
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationPathError {
    #[error("migration chain is empty")]
    Empty,

    #[error("step v{from} -> v{to} does not move forward")]
    NotAscending { from: u32, to: u32 },

    #[error("gap in migration chain: a step ends at v{ended} but the next starts at v{next}")]
    Gap { ended: u32, next: u32 },

    #[error("no migration starts at v{version}")]
    NoStepFrom { version: u32 },
}

/// Why an open request failed.
#[derive(Debug, Error)]
pub enum StoreOpenError {
    /// The template could not be materialized. The store is absent.
    #[error("creation of store '{}' aborted: {reason}", path.display())]
    CreationAborted {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A migration step failed and could not be recovered. The store is left
    /// at the version of the last step that completed.
    #[error("migration v{from} -> v{to} ({description}) failed: {source}")]
    MigrationFailed {
        from: u32,
        to: u32,
        description: &'static str,
        #[source]
        source: StoreError,
    },

    /// The engine itself could not open or read the file.
    #[error("failed to open store '{}': {source}", path.display())]
    StoreOpenFailed {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// The store's version is not the start of any migration step.
    #[error("no migration path from v{from}: {source}")]
    NoMigrationPath {
        from: u32,
        #[source]
        source: MigrationPathError,
    },

    /// The store was written by a newer schema than this build knows.
    #[error("store '{}' is at version {found}, newest supported is {supported}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

impl StoreOpenError {
    pub(crate) fn creation_aborted<E>(path: impl Into<PathBuf>, reason: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreOpenError::CreationAborted {
            path: path.into(),
            reason: reason.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the caller should offer to delete and recreate the store.
    pub fn suggests_reset(&self) -> bool {
        matches!(self, StoreOpenError::StoreOpenFailed { .. })
    }
}

/// Convenience alias for results of store primitives.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
