//! Operation catalog: idempotency preconditions and inverse derivation.
//!
//! Every operation maps to a conjunction of existence guards over live
//! schema state and, where one exists, to an inverse operation. The
//! mapping is an exhaustive match over the closed [`Operation`] set, so
//! adding a variant without a catalog entry fails to compile.

use sqlx::SqliteConnection;

use crate::error::{MigrateError, Result};
use crate::inspector;
use crate::operations::Operation;
use crate::schema::reference_column;

/// One existence guard over live schema state.
///
/// Guards are read-only and evaluated against the connection of the
/// enclosing migration transaction, so all checks within one run see the
/// same snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The table exists.
    TablePresent(String),
    /// The table does not exist.
    TableAbsent(String),
    /// The column exists on the table.
    ColumnPresent {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// The column does not exist on the table.
    ColumnAbsent {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A matching index exists.
    IndexPresent {
        /// Table name.
        table: String,
        /// Indexed columns, in order.
        columns: Vec<String>,
        /// Required uniqueness, if any.
        unique: Option<bool>,
        /// Explicit index name, if any.
        name: Option<String>,
    },
    /// No matching index exists.
    IndexAbsent {
        /// Table name.
        table: String,
        /// Indexed columns, in order.
        columns: Vec<String>,
        /// Required uniqueness, if any.
        unique: Option<bool>,
        /// Explicit index name, if any.
        name: Option<String>,
    },
    /// A foreign key between the two tables exists.
    ForeignKeyPresent {
        /// Referencing table.
        from_table: String,
        /// Referenced table.
        to_table: String,
        /// Referencing column, if constrained.
        column: Option<String>,
    },
    /// No foreign key between the two tables exists.
    ForeignKeyAbsent {
        /// Referencing table.
        from_table: String,
        /// Referenced table.
        to_table: String,
        /// Referencing column, if constrained.
        column: Option<String>,
    },
    /// A named check constraint exists on the table.
    CheckConstraintPresent {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
    /// No such named check constraint exists.
    CheckConstraintAbsent {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
}

impl Precondition {
    /// Evaluates this guard against live schema state.
    pub async fn holds(&self, conn: &mut SqliteConnection) -> Result<bool> {
        match self {
            Self::TablePresent(table) => inspector::table_exists(conn, table).await,
            Self::TableAbsent(table) => Ok(!inspector::table_exists(conn, table).await?),
            Self::ColumnPresent { table, column } => {
                inspector::column_exists(conn, table, column).await
            }
            Self::ColumnAbsent { table, column } => {
                Ok(!inspector::column_exists(conn, table, column).await?)
            }
            Self::IndexPresent {
                table,
                columns,
                unique,
                name,
            } => inspector::index_exists(conn, table, columns, *unique, name.as_deref()).await,
            Self::IndexAbsent {
                table,
                columns,
                unique,
                name,
            } => {
                Ok(!inspector::index_exists(conn, table, columns, *unique, name.as_deref())
                    .await?)
            }
            Self::ForeignKeyPresent {
                from_table,
                to_table,
                column,
            } => {
                inspector::foreign_key_exists(conn, from_table, to_table, column.as_deref()).await
            }
            Self::ForeignKeyAbsent {
                from_table,
                to_table,
                column,
            } => Ok(!inspector::foreign_key_exists(
                conn,
                from_table,
                to_table,
                column.as_deref(),
            )
            .await?),
            Self::CheckConstraintPresent { table, name } => {
                inspector::check_constraint_exists(conn, table, name).await
            }
            Self::CheckConstraintAbsent { table, name } => {
                Ok(!inspector::check_constraint_exists(conn, table, name).await?)
            }
        }
    }
}

impl Operation {
    /// Returns the idempotency guards for this operation. All must hold
    /// for the operation to execute; otherwise it is skipped as a no-op.
    ///
    /// Compound operations return no guards of their own; their
    /// sub-operations carry them.
    #[must_use]
    pub fn precondition(&self) -> Vec<Precondition> {
        match self {
            Self::CreateTable { table, .. } => {
                vec![Precondition::TableAbsent(table.clone())]
            }
            Self::DropTable { table, .. } => {
                vec![Precondition::TablePresent(table.clone())]
            }
            Self::AddColumn { table, column, .. } => vec![
                Precondition::TablePresent(table.clone()),
                Precondition::ColumnAbsent {
                    table: table.clone(),
                    column: column.clone(),
                },
            ],
            Self::RemoveColumn { table, column, .. } => vec![
                Precondition::TablePresent(table.clone()),
                Precondition::ColumnPresent {
                    table: table.clone(),
                    column: column.clone(),
                },
            ],
            Self::RenameColumn { table, from, to } => vec![
                Precondition::ColumnPresent {
                    table: table.clone(),
                    column: from.clone(),
                },
                Precondition::ColumnAbsent {
                    table: table.clone(),
                    column: to.clone(),
                },
            ],
            // Each indexed column must exist: SQLite degrades an unknown
            // double-quoted identifier to a string literal, so without
            // the guard an index over a constant would be created.
            Self::AddIndex {
                table,
                columns,
                options,
            } => {
                let mut guards = vec![Precondition::TablePresent(table.clone())];
                guards.extend(columns.iter().map(|column| Precondition::ColumnPresent {
                    table: table.clone(),
                    column: column.clone(),
                }));
                guards.push(Precondition::IndexAbsent {
                    table: table.clone(),
                    columns: columns.clone(),
                    unique: Some(options.unique),
                    name: options.name.clone(),
                });
                guards
            }
            Self::RemoveIndex {
                table,
                columns,
                options,
            } => vec![Precondition::IndexPresent {
                table: table.clone(),
                columns: columns.clone(),
                unique: None,
                name: options.name.clone(),
            }],
            Self::AddForeignKey {
                from_table,
                to_table,
                options,
            } => vec![
                Precondition::TablePresent(from_table.clone()),
                Precondition::TablePresent(to_table.clone()),
                Precondition::ForeignKeyAbsent {
                    from_table: from_table.clone(),
                    to_table: to_table.clone(),
                    column: options.column.clone(),
                },
            ],
            Self::RemoveForeignKey {
                from_table,
                to_table,
                options,
            } => vec![
                Precondition::TablePresent(from_table.clone()),
                Precondition::TablePresent(to_table.clone()),
                Precondition::ForeignKeyPresent {
                    from_table: from_table.clone(),
                    to_table: to_table.clone(),
                    column: options.column.clone(),
                },
            ],
            // The executor decides between alter and add based on column
            // existence; the table itself must be there.
            Self::ChangeColumn { table, .. } => {
                vec![Precondition::TablePresent(table.clone())]
            }
            Self::ChangeColumnNull { table, column, .. } => vec![Precondition::ColumnPresent {
                table: table.clone(),
                column: column.clone(),
            }],
            Self::AddReference { table, name, .. } => vec![
                Precondition::TablePresent(table.clone()),
                Precondition::ColumnAbsent {
                    table: table.clone(),
                    column: reference_column(name),
                },
            ],
            Self::RemoveReference { table, name, .. } => vec![
                Precondition::TablePresent(table.clone()),
                Precondition::ColumnPresent {
                    table: table.clone(),
                    column: reference_column(name),
                },
            ],
            Self::AddCheckConstraint { table, name, .. } => vec![
                Precondition::TablePresent(table.clone()),
                Precondition::CheckConstraintAbsent {
                    table: table.clone(),
                    name: name.clone(),
                },
            ],
            Self::RemoveCheckConstraint { table, name, .. } => vec![
                Precondition::TablePresent(table.clone()),
                Precondition::CheckConstraintPresent {
                    table: table.clone(),
                    name: name.clone(),
                },
            ],
            Self::AddColumnAndIndex { .. } | Self::RemoveColumnAndIndex { .. } => Vec::new(),
        }
    }

    /// Derives the inverse operation for rollback.
    ///
    /// One-to-one pairs keep identical arguments; self-inverse operations
    /// transform theirs (rename swaps names, nullability change negates
    /// the flag). Operations without a safe inverse return
    /// [`MigrateError::NotInvertible`].
    pub fn invert(&self) -> Result<Self> {
        match self {
            Self::CreateTable { table, definition } => Ok(Self::DropTable {
                table: table.clone(),
                definition: Some(definition.clone()),
            }),

            Self::DropTable {
                table,
                definition: Some(definition),
            } => Ok(Self::CreateTable {
                table: table.clone(),
                definition: definition.clone(),
            }),
            Self::DropTable {
                definition: None, ..
            } => Err(self.not_invertible()),

            Self::AddColumn {
                table,
                column,
                sql_type,
                options,
            } => Ok(Self::RemoveColumn {
                table: table.clone(),
                column: column.clone(),
                sql_type: Some(sql_type.clone()),
                options: options.clone(),
            }),

            Self::RemoveColumn {
                table,
                column,
                sql_type: Some(sql_type),
                options,
            } => Ok(Self::AddColumn {
                table: table.clone(),
                column: column.clone(),
                sql_type: sql_type.clone(),
                options: options.clone(),
            }),
            Self::RemoveColumn { sql_type: None, .. } => Err(self.not_invertible()),

            Self::RenameColumn { table, from, to } => Ok(Self::RenameColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            }),

            Self::AddIndex {
                table,
                columns,
                options,
            } => Ok(Self::RemoveIndex {
                table: table.clone(),
                columns: columns.clone(),
                options: options.clone(),
            }),
            Self::RemoveIndex {
                table,
                columns,
                options,
            } => Ok(Self::AddIndex {
                table: table.clone(),
                columns: columns.clone(),
                options: options.clone(),
            }),

            Self::AddForeignKey {
                from_table,
                to_table,
                options,
            } => Ok(Self::RemoveForeignKey {
                from_table: from_table.clone(),
                to_table: to_table.clone(),
                options: options.clone(),
            }),
            Self::RemoveForeignKey {
                from_table,
                to_table,
                options,
            } => Ok(Self::AddForeignKey {
                from_table: from_table.clone(),
                to_table: to_table.clone(),
                options: options.clone(),
            }),

            // The prior type and options are not tracked, so any generated
            // inverse would fabricate state. Declared one-way.
            Self::ChangeColumn { .. } => Err(self.not_invertible()),

            Self::ChangeColumnNull {
                table,
                column,
                null,
                default,
            } => Ok(Self::ChangeColumnNull {
                table: table.clone(),
                column: column.clone(),
                null: !null,
                default: default.clone(),
            }),

            Self::AddReference {
                table,
                name,
                options,
            } => Ok(Self::RemoveReference {
                table: table.clone(),
                name: name.clone(),
                options: options.clone(),
            }),
            Self::RemoveReference {
                table,
                name,
                options,
            } => Ok(Self::AddReference {
                table: table.clone(),
                name: name.clone(),
                options: options.clone(),
            }),

            Self::AddCheckConstraint {
                table,
                expression,
                name,
            } => Ok(Self::RemoveCheckConstraint {
                table: table.clone(),
                expression: expression.clone(),
                name: name.clone(),
            }),
            Self::RemoveCheckConstraint {
                table,
                expression,
                name,
            } => Ok(Self::AddCheckConstraint {
                table: table.clone(),
                expression: expression.clone(),
                name: name.clone(),
            }),

            Self::AddColumnAndIndex {
                table,
                column,
                sql_type,
                column_options,
                index_options,
            } => Ok(Self::RemoveColumnAndIndex {
                table: table.clone(),
                column: column.clone(),
                sql_type: Some(sql_type.clone()),
                column_options: column_options.clone(),
                index_options: index_options.clone(),
            }),

            Self::RemoveColumnAndIndex {
                table,
                column,
                sql_type: Some(sql_type),
                column_options,
                index_options,
            } => Ok(Self::AddColumnAndIndex {
                table: table.clone(),
                column: column.clone(),
                sql_type: sql_type.clone(),
                column_options: column_options.clone(),
                index_options: index_options.clone(),
            }),
            Self::RemoveColumnAndIndex { sql_type: None, .. } => Err(self.not_invertible()),
        }
    }

    /// Returns true if this operation has a safe inverse.
    #[must_use]
    pub fn is_invertible(&self) -> bool {
        match self {
            Self::ChangeColumn { .. } => false,
            Self::DropTable { definition, .. } => definition.is_some(),
            Self::RemoveColumn { sql_type, .. }
            | Self::RemoveColumnAndIndex { sql_type, .. } => sql_type.is_some(),
            _ => true,
        }
    }

    fn not_invertible(&self) -> MigrateError {
        MigrateError::NotInvertible(self.description())
    }
}
