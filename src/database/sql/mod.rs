//! Injection-safe SQL statement builder
//!
//! Migration steps describe their work through this builder rather than
//! formatting SQL by hand. Values are always passed as positional arguments;
//! only validated identifiers ever end up in the SQL text.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vault_catalog::database::sql::Sql;
//!
//! let removed = Sql::delete_from("CLOUD_ENTITY")
//!     .where_("TYPE", Sql::eq("LOCAL"))
//!     .execute_on(&store)?;
//!
//! let names = Sql::query("VAULT_ENTITY")
//!     .columns(&["_id", "FOLDER_NAME"])
//!     .where_("FOLDER_CLOUD_ID", Sql::not_eq(4))
//!     .order_by("_id")
//!     .execute_on(&store, |row| row.required_text("FOLDER_NAME"))?;
//! ```
//!
//! Structural misuse (an insert without columns, an invalid identifier, an
//! out-of-range conflict code) fails with a [`StatementError`] before the
//! store is touched.

mod ddl;
mod dml;
mod query;

pub use ddl::{AlterTableBuilder, CreateTableBuilder, ForeignKeyAction};
pub use dml::{DeleteBuilder, InsertBuilder, UpdateBuilder};
pub use query::QueryBuilder;

use crate::database::core::{BoundArgument, StatementError};

/// Entry point of the builder
pub struct Sql;

impl Sql {
    pub fn query(table: &str) -> QueryBuilder {
        QueryBuilder::new(table)
    }

    pub fn insert_into(table: &str) -> InsertBuilder {
        InsertBuilder::new(table)
    }

    pub fn update(table: &str) -> UpdateBuilder {
        UpdateBuilder::new(table)
    }

    pub fn delete_from(table: &str) -> DeleteBuilder {
        DeleteBuilder::new(table)
    }

    pub fn create_table(table: &str) -> CreateTableBuilder {
        CreateTableBuilder::new(table)
    }

    pub fn alter_table(table: &str) -> AlterTableBuilder {
        AlterTableBuilder::new(table)
    }

    /// `column = ?`
    pub fn eq(value: impl Into<BoundArgument>) -> Criterion {
        Criterion::Eq(value.into())
    }

    /// `column != ?`
    pub fn not_eq(value: impl Into<BoundArgument>) -> Criterion {
        Criterion::NotEq(value.into())
    }

    pub fn is_null() -> Criterion {
        Criterion::IsNull
    }

    pub fn is_not_null() -> Criterion {
        Criterion::IsNotNull
    }

    /// `column IN (?, ?, ...)`, one placeholder per value
    pub fn in_list<I, V>(values: I) -> Criterion
    where
        I: IntoIterator<Item = V>,
        V: Into<BoundArgument>,
    {
        Criterion::In(values.into_iter().map(Into::into).collect())
    }
}

/// A predicate on one column
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Eq(BoundArgument),
    NotEq(BoundArgument),
    IsNull,
    IsNotNull,
    In(Vec<BoundArgument>),
}

impl Criterion {
    fn append_to(
        &self,
        column: &str,
        clause: &mut String,
        args: &mut Vec<BoundArgument>,
    ) -> Result<(), StatementError> {
        match self {
            Criterion::Eq(value) => {
                clause.push_str(&format!("{} = ?", column));
                args.push(value.clone());
            }
            Criterion::NotEq(value) => {
                clause.push_str(&format!("{} != ?", column));
                args.push(value.clone());
            }
            Criterion::IsNull => clause.push_str(&format!("{} IS NULL", column)),
            Criterion::IsNotNull => clause.push_str(&format!("{} IS NOT NULL", column)),
            Criterion::In(values) => {
                if values.is_empty() {
                    return Err(StatementError::EmptyInList {
                        column: column.to_string(),
                    });
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                clause.push_str(&format!("{} IN ({})", column, placeholders));
                args.extend(values.iter().cloned());
            }
        }
        Ok(())
    }
}

/// Conjunction of column predicates, in the order they were added
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    criteria: Vec<(String, Criterion)>,
}

impl WhereClause {
    pub fn push(&mut self, column: &str, criterion: Criterion) {
        self.criteria.push((column.to_string(), criterion));
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Render to a clause and its positional arguments. `None` when empty.
    pub fn build(&self) -> Result<Option<(String, Vec<BoundArgument>)>, StatementError> {
        if self.criteria.is_empty() {
            return Ok(None);
        }
        let mut clause = String::new();
        let mut args = Vec::new();
        for (idx, (column, criterion)) in self.criteria.iter().enumerate() {
            validate_identifier(column)?;
            if idx > 0 {
                clause.push_str(" AND ");
            }
            criterion.append_to(column, &mut clause, &mut args)?;
        }
        Ok(Some((clause, args)))
    }
}

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Blob,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<(), StatementError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StatementError::InvalidIdentifier(name.to_string()))
    }
}
