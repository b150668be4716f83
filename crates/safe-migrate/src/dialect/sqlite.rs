//! SQLite dialect.
//!
//! SQLite has limited ALTER TABLE support: foreign keys and check
//! constraints must be declared at table creation time, and column
//! type/nullability changes require the table recreation strategy. Those
//! operations emit `--` comments that the executor skips with a warning.

use crate::operations::Operation;
use crate::schema::{reference_column, SqlType, TableDefinition};

use super::MigrationDialect;

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, table: &str, definition: &TableDefinition) -> String {
        let mut col_defs = Vec::with_capacity(definition.columns.len() + 1);
        if definition.id {
            col_defs.push(format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                self.quote_identifier("id")
            ));
        }
        for decl in &definition.columns {
            col_defs.push(self.column_definition(&decl.name, &decl.sql_type, &decl.options));
        }

        format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(table),
            col_defs.join(",\n  ")
        )
    }

    fn add_index_sql(&self, table: &str, columns: &[String], unique: bool, name: &str) -> String {
        let mut sql = String::from("CREATE ");
        if unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(table));
        sql.push_str(" (");
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        sql.push_str(&quoted.join(", "));
        sql.push(')');
        sql
    }

    fn drop_index_sql(&self, name: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn generate_sql(&self, operation: &Operation) -> Vec<String> {
        match operation {
            Operation::CreateTable { table, definition } => {
                vec![self.create_table_sql(table, definition)]
            }

            Operation::DropTable { table, .. } => {
                vec![format!("DROP TABLE {}", self.quote_identifier(table))]
            }

            Operation::AddColumn {
                table,
                column,
                sql_type,
                options,
            } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column, sql_type, options)
            )],

            Operation::RemoveColumn { table, column, .. } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.quote_identifier(table),
                self.quote_identifier(column)
            )],

            Operation::RenameColumn { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.quote_identifier(table),
                self.quote_identifier(from),
                self.quote_identifier(to)
            )],

            Operation::AddIndex {
                table,
                columns,
                options,
            } => vec![self.add_index_sql(
                table,
                columns,
                options.unique,
                &options.name_for(table, columns),
            )],

            Operation::RemoveIndex {
                table,
                columns,
                options,
            } => vec![self.drop_index_sql(&options.name_for(table, columns))],

            Operation::AddForeignKey {
                from_table,
                to_table,
                ..
            } => {
                // Foreign keys must be declared at table creation time in
                // SQLite. Table recreation required.
                vec![format!(
                    "-- foreign key from '{from_table}' to '{to_table}' cannot be added \
                     after table creation in SQLite; table recreation required"
                )]
            }

            Operation::RemoveForeignKey {
                from_table,
                to_table,
                ..
            } => vec![format!(
                "-- foreign key from '{from_table}' to '{to_table}' cannot be dropped \
                 in SQLite; table recreation required"
            )],

            Operation::ChangeColumn { table, column, .. } => vec![format!(
                "-- ALTER COLUMN is not supported in SQLite; table recreation \
                 required for: {table}.{column}"
            )],

            Operation::ChangeColumnNull { table, column, .. } => vec![format!(
                "-- changing nullability is not supported in SQLite; table \
                 recreation required for: {table}.{column}"
            )],

            Operation::AddReference {
                table,
                name,
                options,
            } => {
                let column = reference_column(name);
                let mut statements = vec![format!(
                    "ALTER TABLE {} ADD COLUMN {} INTEGER",
                    self.quote_identifier(table),
                    self.quote_identifier(&column)
                )];
                if options.index {
                    let columns = vec![column.clone()];
                    let index_name = format!("index_{table}_on_{column}");
                    statements.push(self.add_index_sql(table, &columns, false, &index_name));
                }
                statements
            }

            Operation::RemoveReference {
                table,
                name,
                options,
            } => {
                let column = reference_column(name);
                let mut statements = Vec::new();
                if options.index {
                    statements.push(self.drop_index_sql(&format!("index_{table}_on_{column}")));
                }
                statements.push(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.quote_identifier(table),
                    self.quote_identifier(&column)
                ));
                statements
            }

            Operation::AddCheckConstraint { table, name, .. } => vec![format!(
                "-- check constraint '{name}' cannot be added after table creation \
                 in SQLite; table recreation required for: {table}"
            )],

            Operation::RemoveCheckConstraint { table, name, .. } => vec![format!(
                "-- check constraint '{name}' cannot be dropped in SQLite; table \
                 recreation required for: {table}"
            )],

            Operation::AddColumnAndIndex { .. } | Operation::RemoveColumnAndIndex { .. } => {
                operation
                    .sub_operations()
                    .unwrap_or_default()
                    .iter()
                    .flat_map(|sub| self.generate_sql(sub))
                    .collect()
            }
        }
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Integer | SqlType::BigInt | SqlType::Boolean => "INTEGER".to_string(),
            SqlType::Text
            | SqlType::Varchar(_)
            | SqlType::DateTime
            | SqlType::Date
            | SqlType::Json => "TEXT".to_string(),
            SqlType::Double => "REAL".to_string(),
            SqlType::Decimal(_, _) => "NUMERIC".to_string(),
            SqlType::Blob => "BLOB".to_string(),
        }
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }
}
