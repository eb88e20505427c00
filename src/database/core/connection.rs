//! SQLite engine adapter
//!
//! [`SqliteStore`] wraps a rusqlite connection and exposes it through the
//! [`StoreHandle`] primitives. Every other layer of the catalog talks to the
//! store through that trait only.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::handle::{
    BoundArgument, CancellationSignal, ConflictAlgorithm, ContentValues, PreparedStatement,
    RowSet, StoreHandle,
};

/// Live connection to a catalog store file
///
/// File-backed stores are configured with WAL journaling, `synchronous=NORMAL`
/// and foreign-key enforcement. In-memory stores get the same pragmas where
/// they apply.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store file at `path`, creating an empty file if none exists.
    ///
    /// The bootstrap controller never lets this create a store: it only calls
    /// it once a template has been materialized at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = SqliteStore { conn };
        store.configure()?;
        Ok(store)
    }

    /// Open a store without touching journal settings, used to inspect files
    /// that are not (yet) trusted.
    pub fn open_unconfigured(path: &Path) -> StoreResult<Self> {
        Ok(SqliteStore {
            conn: Connection::open(path)?,
        })
    }

    /// Create an in-memory store
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = SqliteStore {
            conn: Connection::open_in_memory()?,
        };
        store.configure()?;
        Ok(store)
    }

    fn configure(&self) -> StoreResult<()> {
        // Also forces the engine to read the header, so a file that is not a
        // database fails here rather than on first use.
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        self.conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;",
        )?;

        Ok(())
    }

    /// The underlying rusqlite connection (for advanced queries)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Check if a table exists in the store
    pub fn table_exists(&self, table_name: &str) -> StoreResult<bool> {
        table_exists(self, table_name)
    }

    /// Column names of `table`, in declaration order
    pub fn column_names(&self, table_name: &str) -> StoreResult<Vec<String>> {
        column_names(self, table_name)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> StoreResult<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", table_name);
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Close the connection, surfacing any error the engine reports
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

/// Check if a table exists, through any handle.
pub fn table_exists(handle: &dyn StoreHandle, table_name: &str) -> StoreResult<bool> {
    let rows = handle.query(
        "SELECT COUNT(*) AS n FROM sqlite_master WHERE type='table' AND name=?",
        &[BoundArgument::from(table_name)],
        None,
    )?;
    let count = match rows.first() {
        Some(row) => row.long("n")?.unwrap_or(0),
        None => 0,
    };
    Ok(count > 0)
}

/// Column names of `table`, through any handle. Empty if the table is missing.
pub fn column_names(handle: &dyn StoreHandle, table_name: &str) -> StoreResult<Vec<String>> {
    let rows = handle.query(
        "SELECT name FROM pragma_table_info(?)",
        &[BoundArgument::from(table_name)],
        None,
    )?;
    rows.decode(|row| row.required_text("name"))
}

fn insert_sql(table: &str, conflict: ConflictAlgorithm, values: &ContentValues) -> String {
    if values.is_empty() {
        return format!("INSERT{} INTO {} DEFAULT VALUES", conflict.clause(), table);
    }
    let columns: Vec<&str> = values.columns().collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT{} INTO {} ({}) VALUES ({})",
        conflict.clause(),
        table,
        columns.join(", "),
        placeholders
    )
}

fn update_sql(
    table: &str,
    conflict: ConflictAlgorithm,
    values: &ContentValues,
    where_clause: Option<&str>,
) -> String {
    let assignments: Vec<String> = values.columns().map(|c| format!("{} = ?", c)).collect();
    let mut sql = format!(
        "UPDATE{} {} SET {}",
        conflict.clause(),
        table,
        assignments.join(", ")
    );
    if let Some(clause) = where_clause.filter(|c| !c.trim().is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    sql
}

fn delete_sql(table: &str, where_clause: Option<&str>) -> String {
    match where_clause.filter(|c| !c.trim().is_empty()) {
        Some(clause) => format!("DELETE FROM {} WHERE {}", table, clause),
        None => format!("DELETE FROM {}", table),
    }
}

impl StoreHandle for SqliteStore {
    fn exec_sql(&self, sql: &str) -> StoreResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn exec_sql_with_args(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
        if args.is_empty() {
            return self.exec_sql(sql);
        }
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        while rows.next()?.is_some() {}
        Ok(())
    }

    fn exec_per_connection_sql(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
        // One connection per store: same as a plain exec.
        self.exec_sql_with_args(sql, args)
    }

    fn query(
        &self,
        sql: &str,
        args: &[BoundArgument],
        cancel: Option<&CancellationSignal>,
    ) -> StoreResult<RowSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut out = Vec::new();
        loop {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                return Err(StoreError::Cancelled);
            }
            let Some(row) = rows.next()? else {
                break;
            };
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                let value: Value = row.get(idx)?;
                values.push(BoundArgument::from(value));
            }
            out.push(values);
        }
        Ok(RowSet::new(columns, out))
    }

    fn insert(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &ContentValues,
    ) -> StoreResult<i64> {
        let sql = insert_sql(table, conflict, values);
        let changed = self
            .conn
            .execute(&sql, params_from_iter(values.arguments()))?;
        if changed == 0 {
            // Ignored by the conflict algorithm
            return Ok(-1);
        }
        Ok(self.conn.last_insert_rowid())
    }

    fn update(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &ContentValues,
        where_clause: Option<&str>,
        where_args: &[BoundArgument],
    ) -> StoreResult<usize> {
        let sql = update_sql(table, conflict, values, where_clause);
        let params = values.arguments().chain(where_args.iter());
        Ok(self.conn.execute(&sql, params_from_iter(params))?)
    }

    fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        where_args: &[BoundArgument],
    ) -> StoreResult<usize> {
        let sql = delete_sql(table, where_clause);
        Ok(self
            .conn
            .execute(&sql, params_from_iter(where_args.iter()))?)
    }

    fn compile_statement(&self, sql: &str) -> StoreResult<Box<dyn PreparedStatement + '_>> {
        debug!(sql, "compiling statement");
        let stmt = self.conn.prepare(sql)?;
        Ok(Box::new(SqliteStatement {
            conn: &self.conn,
            stmt,
            sql: sql.to_string(),
        }))
    }

    fn begin_transaction(&self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit_transaction(&self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_transaction(&self) -> StoreResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn version(&self) -> StoreResult<u32> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version.max(0) as u32)
    }

    fn set_version(&self, version: u32) -> StoreResult<()> {
        self.conn.pragma_update(None, "user_version", version)?;
        Ok(())
    }
}

/// A statement compiled by [`SqliteStore`].
pub struct SqliteStatement<'conn> {
    conn: &'conn Connection,
    stmt: rusqlite::Statement<'conn>,
    sql: String,
}

impl SqliteStatement<'_> {
    fn bind_value(&mut self, index: usize, value: Value) -> StoreResult<()> {
        self.stmt.raw_bind_parameter(index, value)?;
        Ok(())
    }
}

impl PreparedStatement for SqliteStatement<'_> {
    fn bind_text(&mut self, index: usize, value: &str) -> StoreResult<()> {
        self.bind_value(index, Value::Text(value.to_string()))
    }

    fn bind_long(&mut self, index: usize, value: i64) -> StoreResult<()> {
        self.bind_value(index, Value::Integer(value))
    }

    fn bind_double(&mut self, index: usize, value: f64) -> StoreResult<()> {
        self.bind_value(index, Value::Real(value))
    }

    fn bind_null(&mut self, index: usize) -> StoreResult<()> {
        self.bind_value(index, Value::Null)
    }

    fn bind_blob(&mut self, index: usize, value: &[u8]) -> StoreResult<()> {
        self.bind_value(index, Value::Blob(value.to_vec()))
    }

    fn clear_bindings(&mut self) -> StoreResult<()> {
        for index in 1..=self.stmt.parameter_count() {
            self.bind_value(index, Value::Null)?;
        }
        Ok(())
    }

    fn execute(&mut self) -> StoreResult<()> {
        let mut rows = self.stmt.raw_query();
        while rows.next()?.is_some() {}
        Ok(())
    }

    fn execute_insert(&mut self) -> StoreResult<i64> {
        let changed = self.stmt.raw_execute()?;
        if changed == 0 {
            return Ok(-1);
        }
        Ok(self.conn.last_insert_rowid())
    }

    fn execute_update_delete(&mut self) -> StoreResult<usize> {
        Ok(self.stmt.raw_execute()?)
    }

    fn simple_query_for_long(&mut self) -> StoreResult<i64> {
        let mut rows = self.stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
        }
    }

    fn simple_query_for_string(&mut self) -> StoreResult<Option<String>> {
        let mut rows = self.stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
        }
    }

    fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn close(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.stmt.finalize()?;
        Ok(())
    }
}
