//! `CREATE TABLE` and `ALTER TABLE` statements

use super::{validate_identifier, ColumnType};
use crate::database::core::{StatementError, StoreHandle, StoreResult};

/// What happens to a referencing row when its parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    SetNull,
    Cascade,
    Restrict,
    NoAction,
}

impl ForeignKeyAction {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone)]
enum ColumnDef {
    Id,
    Plain {
        name: String,
        column_type: ColumnType,
        not_null: bool,
    },
}

#[derive(Debug, Clone)]
struct ForeignKey {
    column: String,
    target: String,
    on_delete: ForeignKeyAction,
}

/// Builder for a `CREATE TABLE`
#[derive(Debug, Clone)]
pub struct CreateTableBuilder {
    table: String,
    columns: Vec<ColumnDef>,
    foreign_keys: Vec<ForeignKey>,
}

impl CreateTableBuilder {
    pub(super) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// `_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL`
    pub fn id(mut self) -> Self {
        self.columns.push(ColumnDef::Id);
        self
    }

    pub fn required_text(self, name: &str) -> Self {
        self.column(name, ColumnType::Text, true)
    }

    pub fn optional_text(self, name: &str) -> Self {
        self.column(name, ColumnType::Text, false)
    }

    pub fn required_integer(self, name: &str) -> Self {
        self.column(name, ColumnType::Integer, true)
    }

    pub fn optional_integer(self, name: &str) -> Self {
        self.column(name, ColumnType::Integer, false)
    }

    pub fn column(mut self, name: &str, column_type: ColumnType, not_null: bool) -> Self {
        self.columns.push(ColumnDef::Plain {
            name: name.to_string(),
            column_type,
            not_null,
        });
        self
    }

    /// `column` references `target(_id)`
    pub fn foreign_key(mut self, column: &str, target: &str, on_delete: ForeignKeyAction) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            target: target.to_string(),
            on_delete,
        });
        self
    }

    pub fn build(&self) -> Result<String, StatementError> {
        validate_identifier(&self.table)?;
        if self.columns.is_empty() {
            return Err(StatementError::EmptyTable {
                table: self.table.clone(),
            });
        }

        let mut parts = Vec::with_capacity(self.columns.len() + self.foreign_keys.len());
        for column in &self.columns {
            match column {
                ColumnDef::Id => parts.push("_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string()),
                ColumnDef::Plain {
                    name,
                    column_type,
                    not_null,
                } => {
                    validate_identifier(name)?;
                    let suffix = if *not_null { " NOT NULL" } else { "" };
                    parts.push(format!("{} {}{}", name, column_type.as_sql(), suffix));
                }
            }
        }
        for fk in &self.foreign_keys {
            validate_identifier(&fk.column)?;
            validate_identifier(&fk.target)?;
            parts.push(format!(
                "CONSTRAINT FK_{col}_{target} FOREIGN KEY ({col}) REFERENCES {target}(_id) ON DELETE {action}",
                col = fk.column,
                target = fk.target,
                action = fk.on_delete.as_sql()
            ));
        }

        Ok(format!("CREATE TABLE {} ({})", self.table, parts.join(", ")))
    }

    pub fn execute_on<H: StoreHandle + ?Sized>(self, handle: &H) -> StoreResult<()> {
        let sql = self.build()?;
        handle.exec_sql(&sql)
    }
}

#[derive(Debug, Clone)]
enum Alteration {
    RenameTo(String),
    AddColumn(String, ColumnType),
    RenameColumn(String, String),
}

/// Builder for one or more `ALTER TABLE` statements, executed in order
#[derive(Debug, Clone)]
pub struct AlterTableBuilder {
    table: String,
    alterations: Vec<Alteration>,
}

impl AlterTableBuilder {
    pub(super) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alterations: Vec::new(),
        }
    }

    pub fn rename_to(mut self, name: &str) -> Self {
        self.alterations.push(Alteration::RenameTo(name.to_string()));
        self
    }

    pub fn add_column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.alterations
            .push(Alteration::AddColumn(name.to_string(), column_type));
        self
    }

    pub fn rename_column(mut self, from: &str, to: &str) -> Self {
        self.alterations
            .push(Alteration::RenameColumn(from.to_string(), to.to_string()));
        self
    }

    pub fn build(&self) -> Result<Vec<String>, StatementError> {
        validate_identifier(&self.table)?;
        if self.alterations.is_empty() {
            return Err(StatementError::EmptyAlter {
                table: self.table.clone(),
            });
        }

        // A rename changes the name later alterations must use.
        let mut current = self.table.as_str();
        let mut statements = Vec::with_capacity(self.alterations.len());
        for alteration in &self.alterations {
            match alteration {
                Alteration::RenameTo(name) => {
                    validate_identifier(name)?;
                    statements.push(format!("ALTER TABLE {} RENAME TO {}", current, name));
                    current = name.as_str();
                }
                Alteration::AddColumn(name, column_type) => {
                    validate_identifier(name)?;
                    statements.push(format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        current,
                        name,
                        column_type.as_sql()
                    ));
                }
                Alteration::RenameColumn(from, to) => {
                    validate_identifier(from)?;
                    validate_identifier(to)?;
                    statements.push(format!(
                        "ALTER TABLE {} RENAME COLUMN {} TO {}",
                        current, from, to
                    ));
                }
            }
        }
        Ok(statements)
    }

    pub fn execute_on<H: StoreHandle + ?Sized>(self, handle: &H) -> StoreResult<()> {
        for statement in self.build()? {
            handle.exec_sql(&statement)?;
        }
        Ok(())
    }
}
