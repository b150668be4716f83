//! Migration runner.
//!
//! Orchestrates one migration at a time: acquire the runner lock, open a
//! transaction, replay the declared operations through the step executor,
//! update the ledger, commit. A step error aborts the transaction and
//! leaves the ledger and schema exactly as before the attempt.

use std::fmt;

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

use crate::dialect::MigrationDialect;
use crate::error::Result;
use crate::executor::{MigrationStep, StepExecutor};
use crate::ledger::MigrationLedger;
use crate::operations::Operation;

/// Direction of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply the declared operations.
    Up,
    /// Apply the derived inverse operations in reverse order.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Ledger-derived status of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Not in the ledger; the runner must execute it.
    Pending,
    /// Recorded in the ledger.
    Applied,
}

/// A migration ready to be executed: identity plus declared operations.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    /// Migration version (unique identity, e.g. a timestamp).
    pub version: i64,
    /// Migration name.
    pub name: String,
    /// Operations in declaration order.
    pub operations: Vec<Operation>,
}

impl MigrationPlan {
    /// Creates a new empty plan.
    #[must_use]
    pub fn new(version: i64, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Adds an operation to this plan.
    #[must_use]
    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Adds operations to this plan.
    #[must_use]
    pub fn operations(mut self, ops: Vec<Operation>) -> Self {
        self.operations.extend(ops);
        self
    }

    /// Returns whether every operation in this plan has a safe inverse.
    #[must_use]
    pub fn is_invertible(&self) -> bool {
        self.operations.iter().all(Operation::is_invertible)
    }

    /// Derives the rollback operations: each declared operation inverted,
    /// in reverse declaration order.
    ///
    /// Inversion is driven by the operations as declared, regardless of
    /// whether the forward step actually applied. A one-way operation
    /// fails the whole derivation.
    pub fn inverse_operations(&self) -> Result<Vec<Operation>> {
        self.operations
            .iter()
            .rev()
            .map(Operation::invert)
            .collect()
    }
}

/// Runs migrations against a database.
pub struct MigrationRunner<D: MigrationDialect> {
    pool: SqlitePool,
    executor: StepExecutor<D>,
    ledger: MigrationLedger,
}

impl<D: MigrationDialect> MigrationRunner<D> {
    /// Creates a new migration runner.
    pub fn new(pool: SqlitePool, dialect: D) -> Self {
        let ledger = MigrationLedger::new(pool.clone());
        Self {
            pool,
            executor: StepExecutor::new(dialect),
            ledger,
        }
    }

    /// Ensures the ledger and lock tables exist.
    pub async fn init(&self) -> Result<()> {
        self.ledger.ensure_tables().await
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    /// Checks if a migration has been applied.
    pub async fn is_applied(&self, version: i64) -> Result<bool> {
        self.ledger.is_applied(version).await
    }

    /// Applies a single migration. Returns the recorded steps, or an
    /// empty list when the ledger already shows it applied.
    pub async fn apply(&self, plan: &MigrationPlan) -> Result<Vec<MigrationStep>> {
        self.run(plan, Direction::Up).await
    }

    /// Rolls back a single migration. Returns the executed inverse steps,
    /// or an empty list when the ledger shows it was never applied.
    pub async fn rollback(&self, plan: &MigrationPlan) -> Result<Vec<MigrationStep>> {
        self.run(plan, Direction::Down).await
    }

    /// Applies multiple migrations in order.
    pub async fn apply_all(&self, plans: &[MigrationPlan]) -> Result<()> {
        for plan in plans {
            self.apply(plan).await?;
        }
        Ok(())
    }

    /// Rolls back multiple migrations in reverse order.
    pub async fn rollback_all(&self, plans: &[MigrationPlan]) -> Result<()> {
        for plan in plans.iter().rev() {
            self.rollback(plan).await?;
        }
        Ok(())
    }

    /// Returns migrations the ledger does not show as applied.
    pub async fn pending<'a>(
        &self,
        plans: &'a [MigrationPlan],
    ) -> Result<Vec<&'a MigrationPlan>> {
        let applied = self.ledger.applied_versions().await?;
        Ok(plans
            .iter()
            .filter(|p| !applied.contains(&p.version))
            .collect())
    }

    /// Returns the ledger-derived status of each plan.
    pub async fn status<'a>(
        &self,
        plans: &'a [MigrationPlan],
    ) -> Result<Vec<(&'a MigrationPlan, MigrationStatus)>> {
        let applied = self.ledger.applied_versions().await?;
        Ok(plans
            .iter()
            .map(|p| {
                let status = if applied.contains(&p.version) {
                    MigrationStatus::Applied
                } else {
                    MigrationStatus::Pending
                };
                (p, status)
            })
            .collect())
    }

    /// Generates forward SQL for a plan without executing it.
    #[must_use]
    pub fn sql_for(&self, plan: &MigrationPlan) -> Vec<String> {
        plan.operations
            .iter()
            .flat_map(|op| self.executor.dialect().generate_sql(op))
            .collect()
    }

    /// Generates rollback SQL for a plan without executing it.
    pub fn rollback_sql_for(&self, plan: &MigrationPlan) -> Result<Vec<String>> {
        Ok(plan
            .inverse_operations()?
            .iter()
            .flat_map(|op| self.executor.dialect().generate_sql(op))
            .collect())
    }

    async fn run(&self, plan: &MigrationPlan, direction: Direction) -> Result<Vec<MigrationStep>> {
        self.ledger.try_acquire_lock().await?;
        let result = self.run_locked(plan, direction).await;
        if let Err(release_err) = self.ledger.release_lock().await {
            warn!(error = %release_err, "failed to release migration lock");
        }
        result
    }

    async fn run_locked(
        &self,
        plan: &MigrationPlan,
        direction: Direction,
    ) -> Result<Vec<MigrationStep>> {
        // Re-checked under the lock so two runners racing on the same
        // pending migration cannot both apply it.
        let applied = self.ledger.is_applied(plan.version).await?;
        match direction {
            Direction::Up if applied => {
                warn!(
                    version = plan.version,
                    name = %plan.name,
                    "migration already applied, skipping"
                );
                return Ok(Vec::new());
            }
            Direction::Down if !applied => {
                warn!(
                    version = plan.version,
                    name = %plan.name,
                    "migration not applied, skipping rollback"
                );
                return Ok(Vec::new());
            }
            _ => {}
        }

        // Inverses derive from the operations as declared, not from what
        // the forward run actually changed. A one-way operation aborts
        // here, before any DDL.
        let operations = match direction {
            Direction::Up => plan.operations.clone(),
            Direction::Down => plan.inverse_operations()?,
        };

        info!(
            version = plan.version,
            name = %plan.name,
            direction = %direction,
            "running migration"
        );

        let mut tx = self.pool.begin().await?;
        let mut steps = Vec::with_capacity(operations.len());
        for operation in &operations {
            let result = self.executor.execute(&mut tx, operation).await?;
            debug!(
                operation = %operation.description(),
                applied = result.applied,
                "step finished"
            );
            steps.push(MigrationStep {
                operation: operation.clone(),
                applied: result.applied,
            });
        }

        match direction {
            Direction::Up => {
                self.ledger
                    .record_applied(&mut tx, plan.version, &plan.name)
                    .await?;
            }
            Direction::Down => {
                self.ledger.record_rolled_back(&mut tx, plan.version).await?;
            }
        }

        tx.commit().await?;

        info!(
            version = plan.version,
            name = %plan.name,
            direction = %direction,
            "migration complete"
        );

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::error::MigrateError;
    use crate::inspector;
    use crate::schema::{ColumnOptions, IndexOptions, SqlType, TableDefinition};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn runner(pool: &SqlitePool) -> MigrationRunner<SqliteDialect> {
        let runner = MigrationRunner::new(pool.clone(), SqliteDialect::new());
        runner.init().await.unwrap();
        runner
    }

    fn users_migration() -> MigrationPlan {
        MigrationPlan::new(20240101, "create_users")
            .operation(Operation::create_table(
                "users",
                TableDefinition::new().string("name"),
            ))
            .operation(Operation::add_column(
                "users",
                "email",
                SqlType::Varchar(255),
                ColumnOptions::default(),
            ))
            .operation(Operation::add_index(
                "users",
                "email",
                IndexOptions::new().unique(),
            ))
    }

    async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        inspector::table_exists(&mut conn, table).await.unwrap()
    }

    async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        inspector::column_exists(&mut conn, table, column)
            .await
            .unwrap()
    }

    async fn index_exists(pool: &SqlitePool, table: &str, column: &str) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        inspector::index_exists(&mut conn, table, &[column.to_string()], None, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_schema_up_rerun_and_down() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;
        let plan = users_migration();

        // Up: everything applies.
        let steps = runner.apply(&plan).await.unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.applied));
        assert!(table_exists(&pool, "users").await);
        assert!(column_exists(&pool, "users", "email").await);
        assert!(index_exists(&pool, "users", "email").await);
        assert!(runner.is_applied(plan.version).await.unwrap());

        // Re-run up: ledger short-circuits, no changes, no errors.
        let steps = runner.apply(&plan).await.unwrap();
        assert!(steps.is_empty());

        // Down: schema returns to its pre-migration state.
        let steps = runner.rollback(&plan).await.unwrap();
        assert_eq!(steps.len(), 3);
        assert!(!table_exists(&pool, "users").await);
        assert!(!runner.is_applied(plan.version).await.unwrap());
    }

    #[tokio::test]
    async fn test_guarded_steps_rerun_when_ledger_is_cleared() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;
        let plan = users_migration();

        runner.apply(&plan).await.unwrap();

        // Force a replay by clearing the ledger; every guard now reports
        // the target state as already satisfied.
        sqlx::query("DELETE FROM safe_migrations")
            .execute(&pool)
            .await
            .unwrap();

        let steps = runner.apply(&plan).await.unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| !s.applied));
    }

    #[tokio::test]
    async fn test_pre_existing_table_skip_and_unsafe_rollback() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;

        // A users table exists before the migration ever runs.
        sqlx::query("CREATE TABLE \"users\" (\"pre_existing_column\" TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let plan = users_migration();
        let steps = runner.apply(&plan).await.unwrap();
        assert!(!steps[0].applied); // create_table skipped
        assert!(steps[1].applied);
        assert!(steps[2].applied);
        assert!(column_exists(&pool, "users", "pre_existing_column").await);
        assert!(column_exists(&pool, "users", "email").await);

        // Down drops the whole table, pre-existing column included. The
        // rollback inverts the operations as declared, not as applied.
        runner.rollback(&plan).await.unwrap();
        assert!(!table_exists(&pool, "users").await);
    }

    #[tokio::test]
    async fn test_concurrent_runner_is_rejected_then_noops() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;
        let other = MigrationRunner::new(pool.clone(), SqliteDialect::new());
        let plan = users_migration();

        // The other runner holds the lock.
        other.ledger().try_acquire_lock().await.unwrap();
        let result = runner.apply(&plan).await;
        assert!(matches!(result, Err(MigrateError::ConcurrentMigration)));
        assert!(!runner.is_applied(plan.version).await.unwrap());

        // The other runner finishes the migration and releases the lock.
        other.ledger().release_lock().await.unwrap();
        other.apply(&plan).await.unwrap();

        // This runner now observes the migration as applied and no-ops.
        let steps = runner.apply(&plan).await.unwrap();
        assert!(steps.is_empty());
    }

    #[tokio::test]
    async fn test_change_column_blocks_rollback_before_ddl() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;

        let plan = MigrationPlan::new(20240102, "widen_age")
            .operation(Operation::create_table(
                "people",
                TableDefinition::new().integer("age"),
            ))
            .operation(Operation::change_column(
                "people",
                "age",
                SqlType::BigInt,
                ColumnOptions::default(),
            ));

        runner.apply(&plan).await.unwrap();
        assert!(table_exists(&pool, "people").await);

        let result = runner.rollback(&plan).await;
        assert!(matches!(result, Err(MigrateError::NotInvertible(_))));

        // No DDL was issued: the table survives and the ledger entry stays.
        assert!(table_exists(&pool, "people").await);
        assert!(runner.is_applied(plan.version).await.unwrap());
    }

    #[tokio::test]
    async fn test_step_error_rolls_back_ledger_and_schema() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;

        // Index names are schema-global in SQLite: an index elsewhere
        // occupies the name the plan's add_index will derive.
        sqlx::query("CREATE TABLE \"legacy\" (\"x\" TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE INDEX \"index_widgets_on_sku\" ON \"legacy\" (\"x\")")
            .execute(&pool)
            .await
            .unwrap();

        let plan = MigrationPlan::new(20240103, "broken")
            .operation(Operation::create_table(
                "widgets",
                TableDefinition::new().string("sku"),
            ))
            // Precondition holds but the CREATE INDEX fails: the derived
            // name is already taken.
            .operation(Operation::add_index("widgets", "sku", IndexOptions::new()));

        let result = runner.apply(&plan).await;
        assert!(matches!(result, Err(MigrateError::DdlExecution { .. })));

        // The transaction was aborted: no table, no ledger entry.
        assert!(!table_exists(&pool, "widgets").await);
        assert!(!runner.is_applied(plan.version).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_and_status() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;

        let m1 = users_migration();
        let m2 = MigrationPlan::new(20240104, "add_posts").operation(Operation::create_table(
            "posts",
            TableDefinition::new().text("body"),
        ));
        let plans = vec![m1.clone(), m2.clone()];

        let pending = runner.pending(&plans).await.unwrap();
        assert_eq!(pending.len(), 2);

        runner.apply(&m1).await.unwrap();

        let pending = runner.pending(&plans).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version, m2.version);

        let status = runner.status(&plans).await.unwrap();
        assert_eq!(status[0].1, MigrationStatus::Applied);
        assert_eq!(status[1].1, MigrationStatus::Pending);
    }

    #[tokio::test]
    async fn test_apply_all_and_rollback_all() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;

        let m1 = users_migration();
        let m2 = MigrationPlan::new(20240105, "add_author_ref")
            .operation(Operation::create_table(
                "posts",
                TableDefinition::new().text("body"),
            ))
            .operation(Operation::add_reference(
                "posts",
                "author",
                crate::schema::ReferenceOptions::new(),
            ));
        let plans = vec![m1, m2];

        runner.apply_all(&plans).await.unwrap();
        assert!(table_exists(&pool, "users").await);
        assert!(table_exists(&pool, "posts").await);
        assert!(column_exists(&pool, "posts", "author_id").await);

        runner.rollback_all(&plans).await.unwrap();
        assert!(!table_exists(&pool, "users").await);
        assert!(!table_exists(&pool, "posts").await);
    }

    #[tokio::test]
    async fn test_sql_preview() {
        let pool = create_test_pool().await;
        let runner = runner(&pool).await;
        let plan = users_migration();

        let forward = runner.sql_for(&plan);
        assert_eq!(forward.len(), 3);
        assert!(forward[0].contains("CREATE TABLE"));

        let backward = runner.rollback_sql_for(&plan).unwrap();
        assert!(backward[0].contains("DROP INDEX"));
        assert!(backward[2].contains("DROP TABLE"));

        let one_way = MigrationPlan::new(20240106, "one_way").operation(
            Operation::change_column("users", "age", SqlType::BigInt, ColumnOptions::default()),
        );
        assert!(runner.rollback_sql_for(&one_way).is_err());
    }
}
