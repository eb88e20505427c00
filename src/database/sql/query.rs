//! `SELECT` statements

use super::{validate_identifier, Criterion, WhereClause};
use crate::database::core::{BoundArgument, Row, StatementError, StoreHandle, StoreResult};

/// Builder for a single-table `SELECT`
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    /// SELECT columns (defaults to *)
    columns: Vec<String>,
    where_clause: WhereClause,
    order_by: Option<String>,
    limit: Option<u64>,
}

impl QueryBuilder {
    pub(super) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            where_clause: WhereClause::default(),
            order_by: None,
            limit: None,
        }
    }

    /// Restrict the projection to `columns`
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Add a predicate; several are combined with `AND`
    pub fn where_(mut self, column: &str, criterion: Criterion) -> Self {
        self.where_clause.push(column, criterion);
        self
    }

    /// Order ascending by `column`
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by = Some(column.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the statement and its positional arguments
    pub fn build(&self) -> Result<(String, Vec<BoundArgument>), StatementError> {
        validate_identifier(&self.table)?;
        for column in &self.columns {
            validate_identifier(column)?;
        }

        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", projection, self.table);
        let mut args = Vec::new();

        if let Some((clause, where_args)) = self.where_clause.build()? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            args = where_args;
        }
        if let Some(column) = &self.order_by {
            validate_identifier(column)?;
            sql.push_str(&format!(" ORDER BY {}", column));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok((sql, args))
    }

    /// Run the query and decode each row with `decode`
    pub fn execute_on<H, T, F>(self, handle: &H, decode: F) -> StoreResult<Vec<T>>
    where
        H: StoreHandle + ?Sized,
        F: FnMut(&Row<'_>) -> StoreResult<T>,
    {
        let (sql, args) = self.build()?;
        handle.query(&sql, &args, None)?.decode(decode)
    }
}
