//! `INSERT`, `UPDATE` and `DELETE` statements

use super::{validate_identifier, Criterion, WhereClause};
use crate::database::core::{
    BoundArgument, ConflictAlgorithm, ContentValues, StatementError, StoreHandle, StoreResult,
};

/// Builder for a single-row `INSERT`
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    values: ContentValues,
    /// Raw conflict code, checked when the statement is built
    conflict_code: i32,
}

impl InsertBuilder {
    pub(super) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            values: ContentValues::new(),
            conflict_code: 0,
        }
    }

    pub fn integer(mut self, column: &str, value: i64) -> Self {
        self.values.put(column, value);
        self
    }

    pub fn text(mut self, column: &str, value: &str) -> Self {
        self.values.put(column, value);
        self
    }

    /// Text column that is NULL when `value` is `None`
    pub fn optional_text(mut self, column: &str, value: Option<&str>) -> Self {
        self.values.put(column, value);
        self
    }

    pub fn null(mut self, column: &str) -> Self {
        self.values.put(column, BoundArgument::Null);
        self
    }

    pub fn value(mut self, column: &str, value: impl Into<BoundArgument>) -> Self {
        self.values.put(column, value);
        self
    }

    pub fn or_conflict(mut self, conflict: ConflictAlgorithm) -> Self {
        self.conflict_code = conflict_code(conflict);
        self
    }

    /// Conflict algorithm by its numeric code (0..=5)
    pub fn conflict_code(mut self, code: i32) -> Self {
        self.conflict_code = code;
        self
    }

    /// Validate the statement without executing it
    pub fn build(&self) -> Result<(ConflictAlgorithm, &ContentValues), StatementError> {
        validate_identifier(&self.table)?;
        if self.values.is_empty() {
            return Err(StatementError::EmptyInsert {
                table: self.table.clone(),
            });
        }
        for column in self.values.columns() {
            validate_identifier(column)?;
        }
        let conflict = ConflictAlgorithm::try_from(self.conflict_code)?;
        Ok((conflict, &self.values))
    }

    /// Insert the row and return its row id
    pub fn execute_on<H: StoreHandle + ?Sized>(self, handle: &H) -> StoreResult<i64> {
        let (conflict, values) = self.build()?;
        handle.insert(&self.table, conflict, values)
    }
}

fn conflict_code(conflict: ConflictAlgorithm) -> i32 {
    match conflict {
        ConflictAlgorithm::None => 0,
        ConflictAlgorithm::Rollback => 1,
        ConflictAlgorithm::Abort => 2,
        ConflictAlgorithm::Fail => 3,
        ConflictAlgorithm::Ignore => 4,
        ConflictAlgorithm::Replace => 5,
    }
}

/// Builder for an `UPDATE` of matching rows
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    values: ContentValues,
    where_clause: WhereClause,
}

impl UpdateBuilder {
    pub(super) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            values: ContentValues::new(),
            where_clause: WhereClause::default(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<BoundArgument>) -> Self {
        self.values.put(column, value);
        self
    }

    /// Add a predicate; without any, every row is updated
    pub fn where_(mut self, column: &str, criterion: Criterion) -> Self {
        self.where_clause.push(column, criterion);
        self
    }

    /// Update matching rows and return how many were affected
    pub fn execute_on<H: StoreHandle + ?Sized>(self, handle: &H) -> StoreResult<usize> {
        validate_identifier(&self.table)?;
        if self.values.is_empty() {
            return Err(StatementError::EmptyUpdate { table: self.table }.into());
        }
        for column in self.values.columns() {
            validate_identifier(column)?;
        }
        let built = self.where_clause.build()?;
        let (clause, args) = match &built {
            Some((clause, args)) => (Some(clause.as_str()), args.as_slice()),
            None => (None, &[][..]),
        };
        handle.update(
            &self.table,
            ConflictAlgorithm::None,
            &self.values,
            clause,
            args,
        )
    }
}

/// Builder for a `DELETE` of matching rows
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: String,
    where_clause: WhereClause,
}

impl DeleteBuilder {
    pub(super) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            where_clause: WhereClause::default(),
        }
    }

    /// Add a predicate; without any, every row is deleted
    pub fn where_(mut self, column: &str, criterion: Criterion) -> Self {
        self.where_clause.push(column, criterion);
        self
    }

    /// Delete matching rows and return how many were removed
    pub fn execute_on<H: StoreHandle + ?Sized>(self, handle: &H) -> StoreResult<usize> {
        validate_identifier(&self.table)?;
        let built = self.where_clause.build()?;
        let (clause, args) = match &built {
            Some((clause, args)) => (Some(clause.as_str()), args.as_slice()),
            None => (None, &[][..]),
        };
        handle.delete(&self.table, clause, args)
    }
}
