//! Database dialect implementations.
//!
//! A dialect turns operations into SQL for a particular database system.
//! Statements starting with `--` mark operations the backend cannot
//! express as ALTER statements; the executor logs and skips them.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::operations::Operation;
use crate::schema::{ColumnOptions, SqlType};

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Generates SQL for a migration operation.
    fn generate_sql(&self, operation: &Operation) -> Vec<String>;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Returns whether this dialect supports ALTER COLUMN.
    fn supports_alter_column(&self) -> bool;

    /// Returns whether this dialect supports adding constraints after
    /// table creation.
    fn supports_add_constraint(&self) -> bool;

    /// Generates a column definition.
    fn column_definition(&self, name: &str, sql_type: &SqlType, options: &ColumnOptions) -> String {
        let mut parts = vec![self.quote_identifier(name), self.type_name(sql_type)];

        if !options.null {
            parts.push("NOT NULL".to_string());
        }

        if options.unique {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default_sql) = options.default.to_sql() {
            parts.push(format!("DEFAULT {default_sql}"));
        }

        parts.join(" ")
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{name}\"")
    }
}
