//! SQL mapping proxy
//!
//! [`MappingStore`] wraps any [`StoreHandle`] and rewrites every SQL string
//! and where-clause through a [`SqlMapping`] before forwarding it. Each call
//! on the proxy becomes exactly one call on the delegate; arguments,
//! cancellation signals and errors pass through untouched.
//!
//! The mapping is evaluated again on every call. A stateful mapping (one that
//! embeds a counter, say) therefore yields a different statement each time,
//! and each compiled statement is its own object with its own bindings.
//!
//! ```rust,ignore
//! use vault_catalog::database::mapping::MappingStore;
//!
//! let store = MappingStore::new(sqlite, |sql: &str| format!("{} -- Comment!", sql));
//! store.exec_sql("INSERT INTO t (c) VALUES ('x')")?;
//! ```

mod statement;

pub use statement::MappedStatement;

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::trace;

use crate::database::core::{
    BoundArgument, CancellationSignal, ConflictAlgorithm, ContentValues, PreparedStatement,
    RowSet, StoreHandle, StoreResult,
};

/// Where-clause that matches every row
pub const ALWAYS_TRUE: &str = "1 = 1";

/// Rewrites SQL on its way to the store
pub trait SqlMapping {
    fn map(&self, sql: &str) -> String;

    /// Rewrite a where-clause. An absent or blank clause is replaced by
    /// [`ALWAYS_TRUE`] before mapping, so that "every row" survives rewriting.
    fn map_where_clause(&self, clause: Option<&str>) -> String {
        let clause = clause
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(ALWAYS_TRUE);
        self.map(clause)
    }
}

impl<F> SqlMapping for F
where
    F: Fn(&str) -> String,
{
    fn map(&self, sql: &str) -> String {
        self(sql)
    }
}

/// Compile statistics for one mapped SQL text.
///
/// Statements are never reused: every `compile_statement` hands out a freshly
/// compiled one, and this only records what was compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileStats {
    pub parameter_count: usize,
    pub compiled: usize,
}

/// A [`StoreHandle`] that maps SQL before handing it to `delegate`
pub struct MappingStore<D, M> {
    delegate: D,
    mapping: M,
    /// Keyed by mapped SQL
    compile_stats: RefCell<HashMap<String, CompileStats>>,
}

impl<D: StoreHandle, M: SqlMapping> MappingStore<D, M> {
    pub fn new(delegate: D, mapping: M) -> Self {
        Self {
            delegate,
            mapping,
            compile_stats: RefCell::new(HashMap::new()),
        }
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn into_inner(self) -> D {
        self.delegate
    }

    /// What has been compiled for `mapped_sql` so far
    pub fn compile_stats(&self, mapped_sql: &str) -> Option<CompileStats> {
        self.compile_stats.borrow().get(mapped_sql).copied()
    }

    /// Number of distinct mapped SQL texts compiled so far
    pub fn distinct_compiled(&self) -> usize {
        self.compile_stats.borrow().len()
    }

    fn map(&self, sql: &str) -> String {
        let mapped = self.mapping.map(sql);
        trace!(original = sql, mapped = mapped.as_str(), "mapped sql");
        mapped
    }
}

impl<D: StoreHandle, M: SqlMapping> StoreHandle for MappingStore<D, M> {
    fn exec_sql(&self, sql: &str) -> StoreResult<()> {
        self.delegate.exec_sql(&self.map(sql))
    }

    fn exec_sql_with_args(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
        self.delegate.exec_sql_with_args(&self.map(sql), args)
    }

    fn exec_per_connection_sql(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
        self.delegate.exec_per_connection_sql(&self.map(sql), args)
    }

    fn query(
        &self,
        sql: &str,
        args: &[BoundArgument],
        cancel: Option<&CancellationSignal>,
    ) -> StoreResult<RowSet> {
        self.delegate.query(&self.map(sql), args, cancel)
    }

    fn insert(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &ContentValues,
    ) -> StoreResult<i64> {
        self.delegate.insert(table, conflict, values)
    }

    fn update(
        &self,
        table: &str,
        conflict: ConflictAlgorithm,
        values: &ContentValues,
        where_clause: Option<&str>,
        where_args: &[BoundArgument],
    ) -> StoreResult<usize> {
        let clause = self.mapping.map_where_clause(where_clause);
        self.delegate
            .update(table, conflict, values, Some(&clause), where_args)
    }

    fn delete(
        &self,
        table: &str,
        where_clause: Option<&str>,
        where_args: &[BoundArgument],
    ) -> StoreResult<usize> {
        let clause = self.mapping.map_where_clause(where_clause);
        self.delegate.delete(table, Some(&clause), where_args)
    }

    fn compile_statement(&self, sql: &str) -> StoreResult<Box<dyn PreparedStatement + '_>> {
        let mapped = self.map(sql);
        let inner = self.delegate.compile_statement(&mapped)?;

        let parameter_count = inner.parameter_count();
        self.compile_stats
            .borrow_mut()
            .entry(mapped)
            .and_modify(|entry| entry.compiled += 1)
            .or_insert(CompileStats {
                parameter_count,
                compiled: 1,
            });
        Ok(Box::new(MappedStatement::new(inner)))
    }

    fn begin_transaction(&self) -> StoreResult<()> {
        self.delegate.begin_transaction()
    }

    fn commit_transaction(&self) -> StoreResult<()> {
        self.delegate.commit_transaction()
    }

    fn rollback_transaction(&self) -> StoreResult<()> {
        self.delegate.rollback_transaction()
    }

    fn version(&self) -> StoreResult<u32> {
        self.delegate.version()
    }

    fn set_version(&self, version: u32) -> StoreResult<()> {
        self.delegate.set_version(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{SqliteStore, StoreError};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Every call a fake store or one of its statements receives
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        ExecSql(String),
        ExecSqlWithArgs(String, Vec<BoundArgument>),
        ExecPerConnection(String, Vec<BoundArgument>),
        Query(String, Vec<BoundArgument>, bool),
        Insert(String),
        Update(String, Option<String>, Vec<BoundArgument>),
        Delete(String, Option<String>, Vec<BoundArgument>),
        Compile(String),
        Bind(usize, usize, BoundArgument),
        ClearBindings(usize),
        Execute(usize),
        Close(usize),
        Begin,
        Commit,
        Rollback,
        Version,
        SetVersion(u32),
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    #[derive(Default)]
    struct RecordingStore {
        log: Log,
        next_statement: Cell<usize>,
        fail_with: RefCell<Option<String>>,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<Call> {
            self.log.borrow().clone()
        }

        fn record(&self, call: Call) -> StoreResult<()> {
            self.log.borrow_mut().push(call);
            match self.fail_with.borrow().as_ref() {
                Some(msg) => Err(StoreError::MissingColumn(msg.clone())),
                None => Ok(()),
            }
        }
    }

    struct RecordingStatement {
        id: usize,
        sql: String,
        log: Log,
    }

    impl RecordingStatement {
        fn record(&self, call: Call) -> StoreResult<()> {
            self.log.borrow_mut().push(call);
            Ok(())
        }
    }

    impl PreparedStatement for RecordingStatement {
        fn bind_text(&mut self, index: usize, value: &str) -> StoreResult<()> {
            self.record(Call::Bind(self.id, index, value.into()))
        }

        fn bind_long(&mut self, index: usize, value: i64) -> StoreResult<()> {
            self.record(Call::Bind(self.id, index, value.into()))
        }

        fn bind_double(&mut self, index: usize, value: f64) -> StoreResult<()> {
            self.record(Call::Bind(self.id, index, value.into()))
        }

        fn bind_null(&mut self, index: usize) -> StoreResult<()> {
            self.record(Call::Bind(self.id, index, BoundArgument::Null))
        }

        fn bind_blob(&mut self, index: usize, value: &[u8]) -> StoreResult<()> {
            self.record(Call::Bind(self.id, index, value.to_vec().into()))
        }

        fn clear_bindings(&mut self) -> StoreResult<()> {
            self.record(Call::ClearBindings(self.id))
        }

        fn execute(&mut self) -> StoreResult<()> {
            self.record(Call::Execute(self.id))
        }

        fn execute_insert(&mut self) -> StoreResult<i64> {
            self.record(Call::Execute(self.id))?;
            Ok(1)
        }

        fn execute_update_delete(&mut self) -> StoreResult<usize> {
            self.record(Call::Execute(self.id))?;
            Ok(0)
        }

        fn simple_query_for_long(&mut self) -> StoreResult<i64> {
            self.record(Call::Execute(self.id))?;
            Ok(0)
        }

        fn simple_query_for_string(&mut self) -> StoreResult<Option<String>> {
            self.record(Call::Execute(self.id))?;
            Ok(None)
        }

        fn parameter_count(&self) -> usize {
            self.sql.matches('?').count()
        }

        fn sql(&self) -> &str {
            &self.sql
        }

        fn close(self: Box<Self>) -> StoreResult<()> {
            self.record(Call::Close(self.id))
        }
    }

    impl StoreHandle for RecordingStore {
        fn exec_sql(&self, sql: &str) -> StoreResult<()> {
            self.record(Call::ExecSql(sql.to_string()))
        }

        fn exec_sql_with_args(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
            self.record(Call::ExecSqlWithArgs(sql.to_string(), args.to_vec()))
        }

        fn exec_per_connection_sql(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
            self.record(Call::ExecPerConnection(sql.to_string(), args.to_vec()))
        }

        fn query(
            &self,
            sql: &str,
            args: &[BoundArgument],
            cancel: Option<&CancellationSignal>,
        ) -> StoreResult<RowSet> {
            self.record(Call::Query(sql.to_string(), args.to_vec(), cancel.is_some()))?;
            Ok(RowSet::new(Vec::new(), Vec::new()))
        }

        fn insert(
            &self,
            table: &str,
            _conflict: ConflictAlgorithm,
            _values: &ContentValues,
        ) -> StoreResult<i64> {
            self.record(Call::Insert(table.to_string()))?;
            Ok(1)
        }

        fn update(
            &self,
            table: &str,
            _conflict: ConflictAlgorithm,
            _values: &ContentValues,
            where_clause: Option<&str>,
            where_args: &[BoundArgument],
        ) -> StoreResult<usize> {
            self.record(Call::Update(
                table.to_string(),
                where_clause.map(str::to_string),
                where_args.to_vec(),
            ))?;
            Ok(0)
        }

        fn delete(
            &self,
            table: &str,
            where_clause: Option<&str>,
            where_args: &[BoundArgument],
        ) -> StoreResult<usize> {
            self.record(Call::Delete(
                table.to_string(),
                where_clause.map(str::to_string),
                where_args.to_vec(),
            ))?;
            Ok(0)
        }

        fn compile_statement(&self, sql: &str) -> StoreResult<Box<dyn PreparedStatement + '_>> {
            self.record(Call::Compile(sql.to_string()))?;
            let id = self.next_statement.get();
            self.next_statement.set(id + 1);
            Ok(Box::new(RecordingStatement {
                id,
                sql: sql.to_string(),
                log: Rc::clone(&self.log),
            }))
        }

        fn begin_transaction(&self) -> StoreResult<()> {
            self.record(Call::Begin)
        }

        fn commit_transaction(&self) -> StoreResult<()> {
            self.record(Call::Commit)
        }

        fn rollback_transaction(&self) -> StoreResult<()> {
            self.record(Call::Rollback)
        }

        fn version(&self) -> StoreResult<u32> {
            self.record(Call::Version)?;
            Ok(13)
        }

        fn set_version(&self, version: u32) -> StoreResult<()> {
            self.record(Call::SetVersion(version))
        }
    }

    fn comment(sql: &str) -> String {
        format!("{} -- Comment!", sql)
    }

    #[test]
    fn test_exec_sql_is_mapped_and_forwarded_once() {
        let store = MappingStore::new(RecordingStore::default(), comment);
        store.exec_sql("INSERT INTO t (c) VALUES ('x')").unwrap();

        assert_eq!(
            store.delegate().calls(),
            vec![Call::ExecSql(
                "INSERT INTO t (c) VALUES ('x') -- Comment!".to_string()
            )]
        );
    }

    #[test]
    fn test_every_primitive_forwards_exactly_one_call() {
        let store = MappingStore::new(RecordingStore::default(), comment);
        let args = vec![BoundArgument::from("x")];
        let signal = CancellationSignal::new();

        store.exec_sql_with_args("UPDATE t SET c = ?", &args).unwrap();
        store.exec_per_connection_sql("PRAGMA x", &[]).unwrap();
        store.query("SELECT c FROM t WHERE c = ?", &args, Some(&signal)).unwrap();
        store
            .insert("t", ConflictAlgorithm::None, &ContentValues::new().with("c", "x"))
            .unwrap();
        store
            .update("t", ConflictAlgorithm::None, &ContentValues::new(), Some("c = ?"), &args)
            .unwrap();
        store.begin_transaction().unwrap();
        store.commit_transaction().unwrap();
        store.rollback_transaction().unwrap();
        store.version().unwrap();
        store.set_version(4).unwrap();

        assert_eq!(
            store.delegate().calls(),
            vec![
                Call::ExecSqlWithArgs("UPDATE t SET c = ? -- Comment!".into(), args.clone()),
                Call::ExecPerConnection("PRAGMA x -- Comment!".into(), vec![]),
                Call::Query("SELECT c FROM t WHERE c = ? -- Comment!".into(), args.clone(), true),
                Call::Insert("t".into()),
                Call::Update("t".into(), Some("c = ? -- Comment!".into()), args),
                Call::Begin,
                Call::Commit,
                Call::Rollback,
                Call::Version,
                Call::SetVersion(4),
            ]
        );
    }

    #[test]
    fn test_delete_without_where_clause_matches_everything() {
        let store = MappingStore::new(RecordingStore::default(), comment);
        let args = vec![BoundArgument::from(7i64)];
        store.delete("t", None, &args).unwrap();

        assert_eq!(
            store.delegate().calls(),
            vec![Call::Delete(
                "t".into(),
                Some(format!("{} -- Comment!", ALWAYS_TRUE)),
                args
            )]
        );
    }

    #[test]
    fn test_missing_and_blank_where_clauses_go_through_the_mapping() {
        let seen = RefCell::new(Vec::new());
        let mapping = |sql: &str| {
            seen.borrow_mut().push(sql.to_string());
            comment(sql)
        };
        let store = MappingStore::new(RecordingStore::default(), mapping);

        store.delete("t", None, &[]).unwrap();
        store.delete("t", Some("  "), &[]).unwrap();
        store
            .update("t", ConflictAlgorithm::None, &ContentValues::new().with("c", 1i64), Some(""), &[])
            .unwrap();

        assert_eq!(*seen.borrow(), vec![ALWAYS_TRUE; 3]);
    }

    #[test]
    fn test_blank_where_clause_deletes_everything_on_a_real_store() {
        let sqlite = SqliteStore::open_in_memory().unwrap();
        sqlite
            .exec_sql("CREATE TABLE t (c TEXT); INSERT INTO t VALUES ('a'), ('b');")
            .unwrap();
        let store = MappingStore::new(sqlite, comment);

        assert_eq!(store.delete("t", Some(""), &[]).unwrap(), 2);
    }

    #[test]
    fn test_stateful_mapping_compiles_independent_statements() {
        let counter = Cell::new(0);
        let mapping = |sql: &str| {
            counter.set(counter.get() + 1);
            format!("{} -- {}", sql, counter.get())
        };
        let store = MappingStore::new(RecordingStore::default(), mapping);

        let sql = "INSERT INTO t (a, b) VALUES (?, ?)";
        let mut statements: Vec<_> = (0..3)
            .map(|_| store.compile_statement(sql).unwrap())
            .collect();
        let mapped: Vec<String> = statements.iter().map(|s| s.sql().to_string()).collect();
        assert_eq!(
            mapped,
            vec![
                format!("{} -- 1", sql),
                format!("{} -- 2", sql),
                format!("{} -- 3", sql)
            ]
        );
        assert_eq!(store.distinct_compiled(), 3);

        for (i, statement) in statements.iter_mut().enumerate() {
            statement.bind_text(2, &format!("value-{}", i)).unwrap();
        }
        let log = store.delegate().calls();
        let binds: Vec<_> = log
            .iter()
            .filter(|call| matches!(call, Call::Bind(..)))
            .cloned()
            .collect();
        assert_eq!(
            binds,
            vec![
                Call::Bind(0, 2, "value-0".into()),
                Call::Bind(1, 2, "value-1".into()),
                Call::Bind(2, 2, "value-2".into()),
            ]
        );

        for statement in statements {
            statement.close().unwrap();
        }
        let closes = store
            .delegate()
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Close(_)))
            .count();
        assert_eq!(closes, 3);
    }

    #[test]
    fn test_same_mapped_sql_still_gets_separate_statements() {
        let store = MappingStore::new(RecordingStore::default(), comment);
        let first = store.compile_statement("SELECT ?").unwrap();
        let second = store.compile_statement("SELECT ?").unwrap();
        assert_eq!(first.sql(), second.sql());

        let entry = store.compile_stats("SELECT ? -- Comment!").unwrap();
        assert_eq!(entry.compiled, 2);
        assert_eq!(entry.parameter_count, 1);
        assert_eq!(
            store
                .delegate()
                .calls()
                .iter()
                .filter(|call| matches!(call, Call::Compile(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_bind_order_is_preserved() {
        let store = MappingStore::new(RecordingStore::default(), comment);
        let mut statement = store.compile_statement("INSERT INTO t VALUES (?, ?, ?, ?)").unwrap();
        statement
            .bind_all(&[
                BoundArgument::from("a"),
                BoundArgument::Null,
                BoundArgument::from(3i64),
                BoundArgument::from(vec![1u8, 2]),
            ])
            .unwrap();
        statement.clear_bindings().unwrap();
        statement.execute().unwrap();

        assert_eq!(
            store.delegate().calls()[1..],
            [
                Call::Bind(0, 1, "a".into()),
                Call::Bind(0, 2, BoundArgument::Null),
                Call::Bind(0, 3, 3i64.into()),
                Call::Bind(0, 4, vec![1u8, 2].into()),
                Call::ClearBindings(0),
                Call::Execute(0),
            ]
        );
    }

    #[test]
    fn test_errors_pass_through_unchanged() {
        let recorder = RecordingStore::default();
        *recorder.fail_with.borrow_mut() = Some("boom".into());
        let store = MappingStore::new(recorder, comment);

        let err = store.exec_sql("SELECT 1").unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn(ref c) if c == "boom"));
        assert!(store.compile_statement("SELECT 1").is_err());
        assert_eq!(store.distinct_compiled(), 0);
        assert_eq!(store.delegate().calls().len(), 2);
    }

    #[test]
    fn test_mapping_over_a_real_store() {
        let sqlite = SqliteStore::open_in_memory().unwrap();
        sqlite
            .exec_sql("CREATE TABLE t (_id INTEGER PRIMARY KEY, c TEXT)")
            .unwrap();
        let store = MappingStore::new(sqlite, comment);

        let mut insert = store.compile_statement("INSERT INTO t (c) VALUES (?)").unwrap();
        insert.bind_text(1, "x").unwrap();
        assert_eq!(insert.execute_insert().unwrap(), 1);
        insert.close().unwrap();

        let rows = store.query("SELECT c FROM t", &[], None).unwrap();
        assert_eq!(rows.first().unwrap().text("c").unwrap(), Some("x".into()));

        // An absent where-clause still removes every row
        assert_eq!(store.delete("t", None, &[]).unwrap(), 1);
    }
}
