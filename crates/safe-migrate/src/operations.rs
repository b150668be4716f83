//! Migration operations.
//!
//! The operation set is closed: one variant per supported DDL change,
//! with explicit per-variant arguments instead of an opaque option bag.
//! Preconditions and inverses for each variant live in [`crate::catalog`].

use serde::{Deserialize, Serialize};

use crate::schema::{
    ColumnOptions, DefaultValue, ForeignKeyOptions, IndexOptions, ReferenceOptions, SqlType,
    TableDefinition,
};

/// A single schema-migration operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a new table from a column block.
    CreateTable {
        /// Table name.
        table: String,
        /// Column block.
        definition: TableDefinition,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
        /// Original definition, if known. Required for inversion.
        definition: Option<TableDefinition>,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Column type.
        sql_type: SqlType,
        /// Column options.
        options: ColumnOptions,
    },

    /// Remove a column from a table.
    RemoveColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Original type, if known. Required for inversion.
        sql_type: Option<SqlType>,
        /// Column options.
        options: ColumnOptions,
    },

    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Current column name.
        from: String,
        /// New column name.
        to: String,
    },

    /// Add an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Columns to index, in order.
        columns: Vec<String>,
        /// Index options.
        options: IndexOptions,
    },

    /// Remove an index.
    RemoveIndex {
        /// Table name.
        table: String,
        /// Indexed columns.
        columns: Vec<String>,
        /// Index options.
        options: IndexOptions,
    },

    /// Add a foreign key between two tables.
    AddForeignKey {
        /// Referencing table.
        from_table: String,
        /// Referenced table.
        to_table: String,
        /// Foreign key options.
        options: ForeignKeyOptions,
    },

    /// Remove a foreign key.
    RemoveForeignKey {
        /// Referencing table.
        from_table: String,
        /// Referenced table.
        to_table: String,
        /// Foreign key options.
        options: ForeignKeyOptions,
    },

    /// Alter a column's type and options. One-way: the prior definition
    /// is not tracked, so no safe inverse exists.
    ChangeColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New column type.
        sql_type: SqlType,
        /// New column options.
        options: ColumnOptions,
    },

    /// Change a column's nullability. Self-inverse with a negated flag.
    ChangeColumnNull {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Whether NULL values are allowed after the change.
        null: bool,
        /// Value to backfill existing NULLs with when tightening.
        default: Option<DefaultValue>,
    },

    /// Add a reference column (`<name>_id`), indexed by default.
    AddReference {
        /// Table name.
        table: String,
        /// Reference name (column becomes `<name>_id`).
        name: String,
        /// Reference options.
        options: ReferenceOptions,
    },

    /// Remove a reference column and its index.
    RemoveReference {
        /// Table name.
        table: String,
        /// Reference name.
        name: String,
        /// Reference options.
        options: ReferenceOptions,
    },

    /// Add a named check constraint.
    AddCheckConstraint {
        /// Table name.
        table: String,
        /// Check expression.
        expression: String,
        /// Constraint name.
        name: String,
    },

    /// Remove a named check constraint.
    RemoveCheckConstraint {
        /// Table name.
        table: String,
        /// Check expression (kept so the removal is invertible).
        expression: String,
        /// Constraint name.
        name: String,
    },

    /// Add a column and an index on it, column first.
    AddColumnAndIndex {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Column type.
        sql_type: SqlType,
        /// Column options.
        column_options: ColumnOptions,
        /// Index options.
        index_options: IndexOptions,
    },

    /// Remove an index and then its column, index first.
    RemoveColumnAndIndex {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Original type, if known. Required for inversion.
        sql_type: Option<SqlType>,
        /// Column options.
        column_options: ColumnOptions,
        /// Index options.
        index_options: IndexOptions,
    },
}

impl Operation {
    // Convenience constructors

    /// Creates a `CreateTable` operation.
    #[must_use]
    pub fn create_table(table: impl Into<String>, definition: TableDefinition) -> Self {
        Self::CreateTable {
            table: table.into(),
            definition,
        }
    }

    /// Creates a `DropTable` operation without a recorded definition.
    #[must_use]
    pub fn drop_table(table: impl Into<String>) -> Self {
        Self::DropTable {
            table: table.into(),
            definition: None,
        }
    }

    /// Creates an `AddColumn` operation.
    #[must_use]
    pub fn add_column(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: SqlType,
        options: ColumnOptions,
    ) -> Self {
        Self::AddColumn {
            table: table.into(),
            column: column.into(),
            sql_type,
            options,
        }
    }

    /// Creates a `RemoveColumn` operation. Pass the original type if the
    /// removal should be invertible.
    #[must_use]
    pub fn remove_column(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: Option<SqlType>,
    ) -> Self {
        Self::RemoveColumn {
            table: table.into(),
            column: column.into(),
            sql_type,
            options: ColumnOptions::default(),
        }
    }

    /// Creates a `RenameColumn` operation.
    #[must_use]
    pub fn rename_column(
        table: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::RenameColumn {
            table: table.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Creates an `AddIndex` operation on a single column.
    #[must_use]
    pub fn add_index(
        table: impl Into<String>,
        column: impl Into<String>,
        options: IndexOptions,
    ) -> Self {
        Self::AddIndex {
            table: table.into(),
            columns: vec![column.into()],
            options,
        }
    }

    /// Creates an `AddIndex` operation on multiple columns.
    #[must_use]
    pub fn add_index_on(
        table: impl Into<String>,
        columns: Vec<String>,
        options: IndexOptions,
    ) -> Self {
        Self::AddIndex {
            table: table.into(),
            columns,
            options,
        }
    }

    /// Creates a `RemoveIndex` operation on a single column.
    #[must_use]
    pub fn remove_index(
        table: impl Into<String>,
        column: impl Into<String>,
        options: IndexOptions,
    ) -> Self {
        Self::RemoveIndex {
            table: table.into(),
            columns: vec![column.into()],
            options,
        }
    }

    /// Creates an `AddForeignKey` operation.
    #[must_use]
    pub fn add_foreign_key(
        from_table: impl Into<String>,
        to_table: impl Into<String>,
        options: ForeignKeyOptions,
    ) -> Self {
        Self::AddForeignKey {
            from_table: from_table.into(),
            to_table: to_table.into(),
            options,
        }
    }

    /// Creates a `RemoveForeignKey` operation.
    #[must_use]
    pub fn remove_foreign_key(
        from_table: impl Into<String>,
        to_table: impl Into<String>,
        options: ForeignKeyOptions,
    ) -> Self {
        Self::RemoveForeignKey {
            from_table: from_table.into(),
            to_table: to_table.into(),
            options,
        }
    }

    /// Creates a `ChangeColumn` operation.
    #[must_use]
    pub fn change_column(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: SqlType,
        options: ColumnOptions,
    ) -> Self {
        Self::ChangeColumn {
            table: table.into(),
            column: column.into(),
            sql_type,
            options,
        }
    }

    /// Creates a `ChangeColumnNull` operation.
    #[must_use]
    pub fn change_column_null(
        table: impl Into<String>,
        column: impl Into<String>,
        null: bool,
        default: Option<DefaultValue>,
    ) -> Self {
        Self::ChangeColumnNull {
            table: table.into(),
            column: column.into(),
            null,
            default,
        }
    }

    /// Creates an `AddReference` operation.
    #[must_use]
    pub fn add_reference(
        table: impl Into<String>,
        name: impl Into<String>,
        options: ReferenceOptions,
    ) -> Self {
        Self::AddReference {
            table: table.into(),
            name: name.into(),
            options,
        }
    }

    /// Creates a `RemoveReference` operation.
    #[must_use]
    pub fn remove_reference(
        table: impl Into<String>,
        name: impl Into<String>,
        options: ReferenceOptions,
    ) -> Self {
        Self::RemoveReference {
            table: table.into(),
            name: name.into(),
            options,
        }
    }

    /// Creates an `AddCheckConstraint` operation.
    #[must_use]
    pub fn add_check_constraint(
        table: impl Into<String>,
        expression: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AddCheckConstraint {
            table: table.into(),
            expression: expression.into(),
            name: name.into(),
        }
    }

    /// Creates a `RemoveCheckConstraint` operation.
    #[must_use]
    pub fn remove_check_constraint(
        table: impl Into<String>,
        expression: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::RemoveCheckConstraint {
            table: table.into(),
            expression: expression.into(),
            name: name.into(),
        }
    }

    /// Creates an `AddColumnAndIndex` operation.
    #[must_use]
    pub fn add_column_and_index(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: SqlType,
        column_options: ColumnOptions,
        index_options: IndexOptions,
    ) -> Self {
        Self::AddColumnAndIndex {
            table: table.into(),
            column: column.into(),
            sql_type,
            column_options,
            index_options,
        }
    }

    /// Creates a `RemoveColumnAndIndex` operation.
    #[must_use]
    pub fn remove_column_and_index(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: Option<SqlType>,
        index_options: IndexOptions,
    ) -> Self {
        Self::RemoveColumnAndIndex {
            table: table.into(),
            column: column.into(),
            sql_type,
            column_options: ColumnOptions::default(),
            index_options,
        }
    }

    /// Returns the sub-operations of a compound operation, in execution
    /// order: column before index on add, index before column on remove.
    #[must_use]
    pub fn sub_operations(&self) -> Option<Vec<Self>> {
        match self {
            Self::AddColumnAndIndex {
                table,
                column,
                sql_type,
                column_options,
                index_options,
            } => Some(vec![
                Self::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                    sql_type: sql_type.clone(),
                    options: column_options.clone(),
                },
                Self::AddIndex {
                    table: table.clone(),
                    columns: vec![column.clone()],
                    options: index_options.clone(),
                },
            ]),

            Self::RemoveColumnAndIndex {
                table,
                column,
                sql_type,
                column_options,
                index_options,
            } => Some(vec![
                Self::RemoveIndex {
                    table: table.clone(),
                    columns: vec![column.clone()],
                    options: index_options.clone(),
                },
                Self::RemoveColumn {
                    table: table.clone(),
                    column: column.clone(),
                    sql_type: sql_type.clone(),
                    options: column_options.clone(),
                },
            ]),

            _ => None,
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("create table '{table}'"),
            Self::DropTable { table, .. } => format!("drop table '{table}'"),
            Self::AddColumn { table, column, .. } => {
                format!("add column '{column}' to table '{table}'")
            }
            Self::RemoveColumn { table, column, .. } => {
                format!("remove column '{column}' from table '{table}'")
            }
            Self::RenameColumn { table, from, to } => {
                format!("rename column '{from}' to '{to}' in table '{table}'")
            }
            Self::AddIndex {
                table,
                columns,
                options,
            } => format!(
                "add index '{}' on table '{table}'",
                options.name_for(table, columns)
            ),
            Self::RemoveIndex {
                table,
                columns,
                options,
            } => format!(
                "remove index '{}' from table '{table}'",
                options.name_for(table, columns)
            ),
            Self::AddForeignKey {
                from_table,
                to_table,
                ..
            } => format!("add foreign key from '{from_table}' to '{to_table}'"),
            Self::RemoveForeignKey {
                from_table,
                to_table,
                ..
            } => format!("remove foreign key from '{from_table}' to '{to_table}'"),
            Self::ChangeColumn { table, column, .. } => {
                format!("change column '{column}' in table '{table}'")
            }
            Self::ChangeColumnNull {
                table,
                column,
                null,
                ..
            } => format!(
                "change column '{column}' in table '{table}' to {}",
                if *null { "nullable" } else { "not null" }
            ),
            Self::AddReference { table, name, .. } => {
                format!("add reference '{name}' to table '{table}'")
            }
            Self::RemoveReference { table, name, .. } => {
                format!("remove reference '{name}' from table '{table}'")
            }
            Self::AddCheckConstraint { table, name, .. } => {
                format!("add check constraint '{name}' to table '{table}'")
            }
            Self::RemoveCheckConstraint { table, name, .. } => {
                format!("remove check constraint '{name}' from table '{table}'")
            }
            Self::AddColumnAndIndex { table, column, .. } => {
                format!("add column '{column}' and index to table '{table}'")
            }
            Self::RemoveColumnAndIndex { table, column, .. } => {
                format!("remove column '{column}' and index from table '{table}'")
            }
        }
    }
}
