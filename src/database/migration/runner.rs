//! Applying a migration path to a live handle

use serde::Serialize;
use tracing::{info, warn};

use super::{MigrationContext, MigrationStep};
use crate::database::core::{StoreError, StoreOpenError};

/// A step that completed, and whether it needed its recovery to do so
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedStep {
    pub from: u32,
    pub to: u32,
    pub description: &'static str,
    pub recovered: bool,
}

/// Apply `path` in order.
///
/// Each step runs in its own transaction, and the store's version is stamped
/// to the step's target inside that transaction. A failure therefore leaves
/// the store at the version of the last step that completed; it is reported
/// as [`StoreOpenError::MigrationFailed`] and nothing after it runs.
///
/// Foreign-key enforcement is off while the path runs so that table rebuilds
/// do not cascade into referencing rows.
pub fn run_path(
    ctx: &MigrationContext<'_>,
    path: &[MigrationStep],
) -> Result<Vec<AppliedStep>, StoreOpenError> {
    let (Some(first), Some(last)) = (path.first(), path.last()) else {
        return Ok(Vec::new());
    };

    ctx.handle
        .exec_sql("PRAGMA foreign_keys=OFF")
        .map_err(|e| failed(first, e))?;

    let mut applied = Vec::with_capacity(path.len());
    let mut outcome = Ok(());
    for step in path {
        info!(
            from = step.from_version(),
            to = step.to_version(),
            description = step.description(),
            "applying migration"
        );
        match apply_step(ctx, step) {
            Ok(recovered) => applied.push(AppliedStep {
                from: step.from_version(),
                to: step.to_version(),
                description: step.description(),
                recovered,
            }),
            Err(err) => {
                warn!(
                    from = step.from_version(),
                    to = step.to_version(),
                    "migration failed: {}",
                    err
                );
                outcome = Err(failed(step, err));
                break;
            }
        }
    }

    let restored = ctx.handle.exec_sql("PRAGMA foreign_keys=ON");
    outcome?;
    restored.map_err(|e| failed(last, e))?;

    info!(applied = applied.len(), "migrations complete");
    Ok(applied)
}

/// Run one step; `Ok(true)` when its recovery had to take over.
fn apply_step(ctx: &MigrationContext<'_>, step: &MigrationStep) -> Result<bool, StoreError> {
    let handle = ctx.handle;

    handle.begin_transaction()?;
    let err = match step
        .apply(ctx)
        .and_then(|_| handle.set_version(step.to_version()))
    {
        Ok(()) => return commit(ctx, step).map(|_| false),
        Err(err) => err,
    };
    rollback(ctx, step);

    if !(step.is_recoverable() && err.is_recoverable()) {
        return Err(err);
    }

    warn!(
        from = step.from_version(),
        to = step.to_version(),
        "migration hit a recoverable error ({}), rebuilding",
        err
    );
    handle.begin_transaction()?;
    let recovered = match step.recover(ctx) {
        Some(result) => result.and_then(|_| handle.set_version(step.to_version())),
        None => Err(err),
    };
    match recovered {
        Ok(()) => commit(ctx, step).map(|_| true),
        Err(err) => {
            rollback(ctx, step);
            Err(err)
        }
    }
}

/// Commit, rolling back if the commit itself fails so no transaction is left open.
fn commit(ctx: &MigrationContext<'_>, step: &MigrationStep) -> Result<(), StoreError> {
    ctx.handle.commit_transaction().map_err(|err| {
        rollback(ctx, step);
        err
    })
}

fn rollback(ctx: &MigrationContext<'_>, step: &MigrationStep) {
    if let Err(e) = ctx.handle.rollback_transaction() {
        warn!(
            from = step.from_version(),
            to = step.to_version(),
            "rollback failed: {}",
            e
        );
    }
}

fn failed(step: &MigrationStep, source: StoreError) -> StoreOpenError {
    StoreOpenError::MigrationFailed {
        from: step.from_version(),
        to: step.to_version(),
        description: step.description(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{
        BoundArgument, CancellationSignal, ConflictAlgorithm, ContentValues, PreparedStatement,
        RowSet, SqliteStore, StoreHandle, StoreResult,
    };
    use std::cell::Cell;
    use crate::database::external::{IdentityCryptor, InMemorySettings};
    use crate::database::migration::Migrations;
    use assert_matches::assert_matches;

    fn create_a(ctx: &MigrationContext<'_>) -> StoreResult<()> {
        ctx.handle.exec_sql("CREATE TABLE A (_id INTEGER PRIMARY KEY)")
    }

    fn create_b(ctx: &MigrationContext<'_>) -> StoreResult<()> {
        ctx.handle.exec_sql("CREATE TABLE B (_id INTEGER PRIMARY KEY)")
    }

    fn insert_into_missing_table(ctx: &MigrationContext<'_>) -> StoreResult<()> {
        ctx.handle.exec_sql("INSERT INTO NOPE (_id) VALUES (1)")
    }

    fn replace_b(ctx: &MigrationContext<'_>) -> StoreResult<()> {
        ctx.handle.exec_sql("DROP TABLE B")?;
        create_b(ctx)
    }

    fn run(
        store: &SqliteStore,
        steps: Vec<MigrationStep>,
        from: u32,
    ) -> Result<Vec<AppliedStep>, StoreOpenError> {
        let migrations = Migrations::new(steps).unwrap();
        let settings = InMemorySettings::new();
        let ctx = MigrationContext {
            handle: store,
            cryptor: &IdentityCryptor,
            settings: &settings,
        };
        run_path(&ctx, migrations.path(from).unwrap())
    }

    #[test]
    fn test_steps_stamp_versions_in_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_version(1).unwrap();

        let applied = run(
            &store,
            vec![
                MigrationStep::new(1, 2, "a", create_a),
                MigrationStep::new(2, 3, "b", create_b),
            ],
            1,
        )
        .unwrap();

        assert_eq!(applied.len(), 2);
        assert!(applied.iter().all(|s| !s.recovered));
        assert_eq!(store.version().unwrap(), 3);
        assert!(store.table_exists("A").unwrap());
        assert!(store.table_exists("B").unwrap());
    }

    #[test]
    fn test_failure_stops_the_chain_at_last_completed_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_version(1).unwrap();

        let result = run(
            &store,
            vec![
                MigrationStep::new(1, 2, "a", create_a),
                MigrationStep::new(2, 3, "broken", insert_into_missing_table),
                MigrationStep::new(3, 4, "b", create_b),
            ],
            1,
        );

        assert_matches!(
            result,
            Err(StoreOpenError::MigrationFailed { from: 2, to: 3, description: "broken", .. })
        );
        assert_eq!(store.version().unwrap(), 2);
        assert!(store.table_exists("A").unwrap());
        assert!(!store.table_exists("B").unwrap());
    }

    #[test]
    fn test_recoverable_error_without_recovery_is_fatal() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_version(1).unwrap();
        store.exec_sql("CREATE TABLE B (_id INTEGER PRIMARY KEY)").unwrap();

        let result = run(&store, vec![MigrationStep::new(1, 2, "b", create_b)], 1);
        assert_matches!(result, Err(StoreOpenError::MigrationFailed { from: 1, to: 2, .. }));
        assert_eq!(store.version().unwrap(), 1);
    }

    #[test]
    fn test_recovery_runs_when_table_already_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_version(1).unwrap();
        store.exec_sql("CREATE TABLE B (LEFTOVER TEXT)").unwrap();

        let applied = run(
            &store,
            vec![MigrationStep::new(1, 2, "b", create_b).with_recovery(replace_b)],
            1,
        )
        .unwrap();

        assert!(applied[0].recovered);
        assert_eq!(store.version().unwrap(), 2);
        assert_eq!(store.column_names("B").unwrap(), vec!["_id"]);
    }

    #[test]
    fn test_foreign_keys_are_restored() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_version(1).unwrap();
        run(&store, vec![MigrationStep::new(1, 2, "a", create_a)], 1).unwrap();

        let enabled: i64 = store
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    /// Forwards to a real store but refuses to commit
    struct CommitRefusing<'a> {
        store: &'a SqliteStore,
        rollbacks: Cell<u32>,
    }

    impl StoreHandle for CommitRefusing<'_> {
        fn exec_sql(&self, sql: &str) -> StoreResult<()> {
            self.store.exec_sql(sql)
        }

        fn exec_sql_with_args(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
            self.store.exec_sql_with_args(sql, args)
        }

        fn exec_per_connection_sql(&self, sql: &str, args: &[BoundArgument]) -> StoreResult<()> {
            self.store.exec_per_connection_sql(sql, args)
        }

        fn query(
            &self,
            sql: &str,
            args: &[BoundArgument],
            cancel: Option<&CancellationSignal>,
        ) -> StoreResult<RowSet> {
            self.store.query(sql, args, cancel)
        }

        fn insert(
            &self,
            table: &str,
            conflict: ConflictAlgorithm,
            values: &ContentValues,
        ) -> StoreResult<i64> {
            self.store.insert(table, conflict, values)
        }

        fn update(
            &self,
            table: &str,
            conflict: ConflictAlgorithm,
            values: &ContentValues,
            where_clause: Option<&str>,
            where_args: &[BoundArgument],
        ) -> StoreResult<usize> {
            self.store
                .update(table, conflict, values, where_clause, where_args)
        }

        fn delete(
            &self,
            table: &str,
            where_clause: Option<&str>,
            where_args: &[BoundArgument],
        ) -> StoreResult<usize> {
            self.store.delete(table, where_clause, where_args)
        }

        fn compile_statement(&self, sql: &str) -> StoreResult<Box<dyn PreparedStatement + '_>> {
            self.store.compile_statement(sql)
        }

        fn begin_transaction(&self) -> StoreResult<()> {
            self.store.begin_transaction()
        }

        fn commit_transaction(&self) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }

        fn rollback_transaction(&self) -> StoreResult<()> {
            self.rollbacks.set(self.rollbacks.get() + 1);
            self.store.rollback_transaction()
        }

        fn version(&self) -> StoreResult<u32> {
            self.store.version()
        }

        fn set_version(&self, version: u32) -> StoreResult<()> {
            self.store.set_version(version)
        }
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_version(1).unwrap();
        let handle = CommitRefusing {
            store: &store,
            rollbacks: Cell::new(0),
        };
        let settings = InMemorySettings::new();
        let ctx = MigrationContext {
            handle: &handle,
            cryptor: &IdentityCryptor,
            settings: &settings,
        };

        let steps = [MigrationStep::new(1, 2, "a", create_a)];
        let result = run_path(&ctx, &steps);

        assert_matches!(result, Err(StoreOpenError::MigrationFailed { from: 1, to: 2, .. }));
        assert_eq!(handle.rollbacks.get(), 1);
        assert!(store.connection().is_autocommit());
        assert_eq!(store.version().unwrap(), 1);
        assert!(!store.table_exists("A").unwrap());
    }
}
