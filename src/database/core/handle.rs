//! The store-handle surface
//!
//! [`StoreHandle`] is the set of primitives every consumer of the catalog store
//! goes through: the SQL builder, migration steps and the bootstrap controller.
//! [`SqliteStore`](super::SqliteStore) implements it over rusqlite, and
//! [`MappingStore`](crate::database::mapping::MappingStore) implements it again as a
//! decorator, so either can be handed to the same code.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;

use super::error::{StatementError, StoreError, StoreResult};

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundArgument {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
    Blob(Vec<u8>),
}

impl BoundArgument {
    pub fn type_name(&self) -> &'static str {
        match self {
            BoundArgument::Text(_) => "text",
            BoundArgument::Integer(_) => "integer",
            BoundArgument::Real(_) => "real",
            BoundArgument::Null => "null",
            BoundArgument::Blob(_) => "blob",
        }
    }
}

impl ToSql for BoundArgument {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            BoundArgument::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            BoundArgument::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            BoundArgument::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            BoundArgument::Null => ToSqlOutput::Owned(Value::Null),
            BoundArgument::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<Value> for BoundArgument {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => BoundArgument::Null,
            Value::Integer(i) => BoundArgument::Integer(i),
            Value::Real(f) => BoundArgument::Real(f),
            Value::Text(s) => BoundArgument::Text(s),
            Value::Blob(b) => BoundArgument::Blob(b),
        }
    }
}

impl From<&str> for BoundArgument {
    fn from(value: &str) -> Self {
        BoundArgument::Text(value.to_string())
    }
}

impl From<String> for BoundArgument {
    fn from(value: String) -> Self {
        BoundArgument::Text(value)
    }
}

impl From<i64> for BoundArgument {
    fn from(value: i64) -> Self {
        BoundArgument::Integer(value)
    }
}

impl From<i32> for BoundArgument {
    fn from(value: i32) -> Self {
        BoundArgument::Integer(value.into())
    }
}

impl From<f64> for BoundArgument {
    fn from(value: f64) -> Self {
        BoundArgument::Real(value)
    }
}

impl From<Vec<u8>> for BoundArgument {
    fn from(value: Vec<u8>) -> Self {
        BoundArgument::Blob(value)
    }
}

impl<T: Into<BoundArgument>> From<Option<T>> for BoundArgument {
    fn from(value: Option<T>) -> Self {
        value.map_or(BoundArgument::Null, Into::into)
    }
}

/// What the engine does when an insert or update violates a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictAlgorithm {
    #[default]
    None,
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

impl ConflictAlgorithm {
    /// The `OR ...` clause placed after `INSERT`/`UPDATE`.
    pub fn clause(&self) -> &'static str {
        match self {
            ConflictAlgorithm::None => "",
            ConflictAlgorithm::Rollback => " OR ROLLBACK",
            ConflictAlgorithm::Abort => " OR ABORT",
            ConflictAlgorithm::Fail => " OR FAIL",
            ConflictAlgorithm::Ignore => " OR IGNORE",
            ConflictAlgorithm::Replace => " OR REPLACE",
        }
    }
}

impl TryFrom<i32> for ConflictAlgorithm {
    type Error = StatementError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ConflictAlgorithm::None),
            1 => Ok(ConflictAlgorithm::Rollback),
            2 => Ok(ConflictAlgorithm::Abort),
            3 => Ok(ConflictAlgorithm::Fail),
            4 => Ok(ConflictAlgorithm::Ignore),
            5 => Ok(ConflictAlgorithm::Replace),
            other => Err(StatementError::InvalidConflictAlgorithm(other)),
        }
    }
}

/// Ordered column/value pairs for insert and update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentValues {
    values: Vec<(String, BoundArgument)>,
}

impl ContentValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier value for the same column in place.
    pub fn put(&mut self, column: &str, value: impl Into<BoundArgument>) -> &mut Self {
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
        self
    }

    pub fn with(mut self, column: &str, value: impl Into<BoundArgument>) -> Self {
        self.put(column, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn arguments(&self) -> impl Iterator<Item = &BoundArgument> {
        self.values.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundArgument)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v))
    }
}

/// Shared flag a caller may flip to cancel an in-flight query.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A fully materialized query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<BoundArgument>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<BoundArgument>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn first(&self) -> Option<Row<'_>> {
        self.rows().next()
    }

    /// Decode every row with `decode`, stopping at the first error.
    pub fn decode<T, F>(&self, mut decode: F) -> StoreResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> StoreResult<T>,
    {
        self.rows().map(|row| decode(&row)).collect()
    }
}

/// One row of a [`RowSet`], read by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [BoundArgument],
}

impl<'a> Row<'a> {
    pub fn value(&self, column: &str) -> StoreResult<&'a BoundArgument> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| StoreError::MissingColumn(column.to_string()))
    }

    pub fn is_null(&self, column: &str) -> StoreResult<bool> {
        Ok(matches!(self.value(column)?, BoundArgument::Null))
    }

    pub fn text(&self, column: &str) -> StoreResult<Option<String>> {
        match self.value(column)? {
            BoundArgument::Null => Ok(None),
            BoundArgument::Text(s) => Ok(Some(s.clone())),
            BoundArgument::Integer(i) => Ok(Some(i.to_string())),
            BoundArgument::Real(f) => Ok(Some(f.to_string())),
            other => Err(type_error(column, "text", other)),
        }
    }

    pub fn long(&self, column: &str) -> StoreResult<Option<i64>> {
        match self.value(column)? {
            BoundArgument::Null => Ok(None),
            BoundArgument::Integer(i) => Ok(Some(*i)),
            other => Err(type_error(column, "integer", other)),
        }
    }

    pub fn double(&self, column: &str) -> StoreResult<Option<f64>> {
        match self.value(column)? {
            BoundArgument::Null => Ok(None),
            BoundArgument::Real(f) => Ok(Some(*f)),
            BoundArgument::Integer(i) => Ok(Some(*i as f64)),
            other => Err(type_error(column, "real", other)),
        }
    }

    pub fn blob(&self, column: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.value(column)? {
            BoundArgument::Null => Ok(None),
            BoundArgument::Blob(b) => Ok(Some(b.clone())),
            other => Err(type_error(column, "blob", other)),
        }
    }

    /// Like [`Row::long`], but a NULL is an error.
    pub fn required_long(&self, column: &str) -> StoreResult<i64> {
        self.long(column)?
            .ok_or_else(|| type_error(column, "integer", &BoundArgument::Null))
    }

    /// Like [`Row::text`], but a NULL is an error.
    pub fn required_text(&self, column: &str) -> StoreResult<String> {
        self.text(column)?
            .ok_or_else(|| type_error(column, "text", &BoundArgument::Null))
    }
}

fn type_error(column: &str, expected: &'static str, found: &BoundArgument) -> StoreError {
    StoreError::ColumnType {
        column: column.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// A compiled, parameterized statement. Indices are 1-based.
pub trait PreparedStatement {
    fn bind_text(&mut self, index: usize, value: &str) -> StoreResult<()>;
    fn bind_long(&mut self, index: usize, value: i64) -> StoreResult<()>;
    fn bind_double(&mut self, index: usize, value: f64) -> StoreResult<()>;
    fn bind_null(&mut self, index: usize) -> StoreResult<()>;
    fn bind_blob(&mut self, index: usize, value: &[u8]) -> StoreResult<()>;
    fn clear_bindings(&mut self) -> StoreResult<()>;

    /// Run a statement that returns no rows.
    fn execute(&mut self) -> StoreResult<()>;
    /// Run an insert and return the new row id.
    fn execute_insert(&mut self) -> StoreResult<i64>;
    /// Run an update or delete and return the number of affected rows.
    fn execute_update_delete(&mut self) -> StoreResult<usize>;
    /// First column of the first row as an integer.
    fn simple_query_for_long(&mut self) -> StoreResult<i64>;
    /// First column of the first row as text.
    fn simple_query_for_string(&mut self) -> StoreResult<Option<String>>;

    fn parameter_count(&self) -> usize;
    fn sql(&self) -> &str;
    fn close(self: Box<Self>) -> StoreResult<()>;

    fn bind(&mut self, index: usize, value: &BoundArgument) -> StoreResult<()> {
        match value {
            BoundArgument::Text(s) => self.bind_text(index, s),
            BoundArgument::Integer(i) => self.bind_long(index, *i),
            BoundArgument::Real(f) => self.bind_double(index, *f),
            BoundArgument::Null => self.bind_null(index),
            BoundArgument::Blob(b) => self.bind_blob(index, b),
        }
    }

    /// Bind `args` to placeholders 1..=n in order.
    fn bind_all(&mut self, args: &[BoundArgument]) -> StoreResult<()> {
        for (i, arg) in args.iter().enumerate() {
            self.bind(i + 1, arg)?;
        }
        Ok(())
    }
}

impl fmt::Debug for dyn PreparedStatement + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql())
            .finish()
    }
}

/// Primitives of a live store connection.
///
/// Implementations are single-owner: callers serialize access themselves.
pub trait StoreHandle {
    /// Execute one statement that takes no arguments and returns no rows.
    fn exec_sql(&self, sql: &str) -> StoreResult<()>;

    /// Execute one statement with positional arguments.
    fn exec_sql_with_args(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()>;

    /// Execute a statement on every connection the engine keeps for this store.
    fn exec_per_connection_sql(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()>;

    fn query(
        &self,
        sql: &str,
        args: &[BoundArgument],
        cancel: Option<&CancellationSignal>,
    ) -> StoreResult<RowSet>;

    /// Insert one row and return its row id.
    fn insert(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &ContentValues,
    ) -> StoreResult<i64>;

    /// Update matching rows. `None` as where-clause affects every row.
    fn update(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &ContentValues,
        where_clause: Option<&str>,
        where_args: &[BoundArgument],
    ) -> StoreResult<usize>;

    /// Delete matching rows. `None` as where-clause affects every row.
    fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        where_args: &[BoundArgument],
    ) -> StoreResult<usize>;

    fn compile_statement(&self, sql: &str) -> StoreResult<Box<dyn PreparedStatement + '_>>;

    fn begin_transaction(&self) -> StoreResult<()>;
    fn commit_transaction(&self) -> StoreResult<()>;
    fn rollback_transaction(&self) -> StoreResult<()>;

    /// The schema version the engine keeps in the store's own metadata.
    fn version(&self) -> StoreResult<u32>;
    fn set_version(&self, version: u32) -> StoreResult<()>;
}
