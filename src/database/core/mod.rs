//! Core store infrastructure
//!
//! This module provides the foundational components used throughout the catalog:
//! - `StoreHandle`: the primitives every layer executes through
//! - `SqliteStore`: the rusqlite engine adapter implementing them
//! - `SchemaDefinitions`: the version-1 template schema and `SchemaStatus`
//! - the error taxonomy shared by all layers

mod connection;
mod error;
mod handle;
mod schema;

pub use connection::{column_names, table_exists, SqliteStatement, SqliteStore};
pub use error::{
    CryptorError, MigrationPathError, SettingsError, StatementError, StoreError, StoreOpenError,
    StoreResult,
};
pub use handle::{
    BoundArgument, CancellationSignal, ConflictAlgorithm, ContentValues, PreparedStatement, Row,
    RowSet, StoreHandle,
};
pub use schema::{
    template_bytes, write_template, SchemaDefinitions, SchemaStatus, Tables, TEMPLATE_VERSION,
};
