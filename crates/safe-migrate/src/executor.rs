//! Migration step executor.
//!
//! Executes one operation at a time: evaluate the catalog precondition
//! against live schema state, skip as a designed no-op when the target
//! state is already in place, otherwise issue the dialect's DDL.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::inspector;
use crate::operations::Operation;

/// Outcome of executing a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Whether DDL was issued. `false` means the precondition already
    /// held and the step was skipped.
    pub applied: bool,
}

/// One operation together with the apply/skip decision made against live
/// schema state.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStep {
    /// The operation as declared.
    pub operation: Operation,
    /// Whether the step issued DDL.
    pub applied: bool,
}

/// Executes operations against a database connection.
pub struct StepExecutor<D: MigrationDialect> {
    dialect: D,
}

impl<D: MigrationDialect> StepExecutor<D> {
    /// Creates a new step executor.
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Executes one operation, honoring its idempotency precondition.
    ///
    /// Compound operations run their sub-operations in the declared
    /// safety order; the result reports `applied` if any sub-operation
    /// issued DDL.
    pub async fn execute(
        &self,
        conn: &mut SqliteConnection,
        operation: &Operation,
    ) -> Result<StepResult> {
        if let Some(subs) = operation.sub_operations() {
            let mut applied = false;
            for sub in &subs {
                applied |= self.execute_single(conn, sub).await?.applied;
            }
            return Ok(StepResult { applied });
        }

        self.execute_single(conn, operation).await
    }

    async fn execute_single(
        &self,
        conn: &mut SqliteConnection,
        operation: &Operation,
    ) -> Result<StepResult> {
        for guard in operation.precondition() {
            if !guard.holds(&mut *conn).await? {
                debug!(
                    operation = %operation.description(),
                    guard = ?guard,
                    "precondition already satisfied, skipping"
                );
                return Ok(StepResult { applied: false });
            }
        }

        // change_column falls back to add_column when the column is
        // missing, mirroring the safe-alter contract.
        let effective = match operation {
            Operation::ChangeColumn {
                table,
                column,
                sql_type,
                options,
            } if !inspector::column_exists(&mut *conn, table, column).await? => {
                Operation::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                    sql_type: sql_type.clone(),
                    options: options.clone(),
                }
            }
            _ => operation.clone(),
        };

        for sql in self.dialect.generate_sql(&effective) {
            if sql.starts_with("--") {
                warn!(comment = %sql, "skipping statement unsupported by this dialect");
                continue;
            }

            debug!(sql = %sql, "executing DDL");
            sqlx::query(&sql)
                .execute(&mut *conn)
                .await
                .map_err(|source| MigrateError::DdlExecution {
                    statement: sql.clone(),
                    source,
                })?;
        }

        Ok(StepResult { applied: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::schema::{ColumnOptions, IndexOptions, SqlType, TableDefinition};
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    fn executor() -> StepExecutor<SqliteDialect> {
        StepExecutor::new(SqliteDialect::new())
    }

    #[tokio::test]
    async fn test_create_table_applies_then_skips() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = executor();

        let op = Operation::create_table("users", TableDefinition::new().string("name"));

        let first = executor.execute(&mut conn, &op).await.unwrap();
        assert!(first.applied);
        assert!(inspector::table_exists(&mut conn, "users").await.unwrap());

        let second = executor.execute(&mut conn, &op).await.unwrap();
        assert!(!second.applied);
    }

    #[tokio::test]
    async fn test_add_column_skipped_when_table_missing() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let op = Operation::add_column(
            "missing",
            "email",
            SqlType::Varchar(255),
            ColumnOptions::default(),
        );

        let result = executor().execute(&mut conn, &op).await.unwrap();
        assert!(!result.applied);
    }

    #[tokio::test]
    async fn test_remove_column_skipped_when_already_gone() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = executor();

        let create = Operation::create_table("users", TableDefinition::new().string("name"));
        executor.execute(&mut conn, &create).await.unwrap();

        let remove = Operation::remove_column("users", "email", None);
        let result = executor.execute(&mut conn, &remove).await.unwrap();
        assert!(!result.applied);
    }

    #[tokio::test]
    async fn test_compound_applies_missing_half_only() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = executor();

        // Column exists already; only the index is missing.
        let create = Operation::create_table("users", TableDefinition::new().string("email"));
        executor.execute(&mut conn, &create).await.unwrap();

        let op = Operation::add_column_and_index(
            "users",
            "email",
            SqlType::Varchar(255),
            ColumnOptions::default(),
            IndexOptions::new().unique(),
        );

        let result = executor.execute(&mut conn, &op).await.unwrap();
        assert!(result.applied);
        assert!(
            inspector::index_exists(&mut conn, "users", &["email".to_string()], Some(true), None)
                .await
                .unwrap()
        );

        // Fully satisfied now, so the compound is a no-op.
        let again = executor.execute(&mut conn, &op).await.unwrap();
        assert!(!again.applied);
    }

    #[tokio::test]
    async fn test_change_column_falls_back_to_add() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = executor();

        let create = Operation::create_table("users", TableDefinition::new().string("name"));
        executor.execute(&mut conn, &create).await.unwrap();

        let change = Operation::change_column(
            "users",
            "age",
            SqlType::Integer,
            ColumnOptions::default(),
        );
        let result = executor.execute(&mut conn, &change).await.unwrap();
        assert!(result.applied);
        assert!(inspector::column_exists(&mut conn, "users", "age")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_add_index_skipped_when_column_missing() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = executor();

        let create = Operation::create_table("users", TableDefinition::new().string("name"));
        executor.execute(&mut conn, &create).await.unwrap();

        let op = Operation::add_index("users", "missing_column", IndexOptions::new());
        let result = executor.execute(&mut conn, &op).await.unwrap();
        assert!(!result.applied);

        // No index over a degraded string literal was left behind.
        assert!(!inspector::index_exists(
            &mut conn,
            "users",
            &[],
            None,
            Some("index_users_on_missing_column")
        )
        .await
        .unwrap());
    }

    #[tokio::test]
    async fn test_ddl_failure_maps_to_ddl_execution() {
        let pool = create_test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let executor = executor();

        let create =
            Operation::create_table("users", TableDefinition::new().string("a").string("b"));
        executor.execute(&mut conn, &create).await.unwrap();

        // An index on a different column occupies the name that will be
        // derived for "b".
        sqlx::query("CREATE INDEX \"index_users_on_b\" ON \"users\" (\"a\")")
            .execute(&mut *conn)
            .await
            .unwrap();

        // Precondition holds (table and column present, no index covering
        // ["b"]), but the CREATE INDEX fails on the name collision.
        let op = Operation::add_index("users", "b", IndexOptions::new());
        let result = executor.execute(&mut conn, &op).await;
        assert!(matches!(
            result,
            Err(MigrateError::DdlExecution { .. })
        ));
    }
}
