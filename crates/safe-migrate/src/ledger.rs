//! Applied-migration ledger.
//!
//! The ledger is the sole source of truth for pending vs applied. Reads
//! go through the pool; writes take the migration transaction's
//! connection so a failed run leaves no trace. A single-row lock table
//! provides mutual exclusion between concurrent runners on backends
//! without an advisory-lock primitive.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;

use crate::error::{MigrateError, Result};

/// SQL to create the ledger table.
pub const CREATE_LEDGER_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS safe_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL to create the runner lock table.
pub const CREATE_LOCK_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS safe_migrations_lock (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    locked_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// A record of an applied migration.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Migration version (unique identity).
    pub version: i64,
    /// Migration name.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Manages the applied-migration ledger and the runner lock.
pub struct MigrationLedger {
    pool: SqlitePool,
}

impl MigrationLedger {
    /// Creates a new ledger over the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensures the ledger and lock tables exist.
    pub async fn ensure_tables(&self) -> Result<()> {
        sqlx::query(CREATE_LEDGER_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_LOCK_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Checks if a migration has been applied.
    pub async fn is_applied(&self, version: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM safe_migrations WHERE version = ?")
                .bind(version)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Returns the set of applied migration versions.
    pub async fn applied_versions(&self) -> Result<HashSet<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT version FROM safe_migrations")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Returns all ledger entries in version order.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT version, name, applied_at FROM safe_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(version, name, applied_at)| LedgerEntry {
                version,
                name,
                applied_at: parse_applied_at(&applied_at),
            })
            .collect())
    }

    /// Returns the most recently applied migration.
    pub async fn latest(&self) -> Result<Option<LedgerEntry>> {
        let row: Option<(i64, String, String)> = sqlx::query_as(
            "SELECT version, name, applied_at FROM safe_migrations \
             ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(version, name, applied_at)| LedgerEntry {
            version,
            name,
            applied_at: parse_applied_at(&applied_at),
        }))
    }

    /// Counts applied migrations.
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM safe_migrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Records a migration as applied. Runs on the migration's
    /// transaction connection.
    pub async fn record_applied(
        &self,
        conn: &mut SqliteConnection,
        version: i64,
        name: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO safe_migrations (version, name) VALUES (?, ?)")
            .bind(version)
            .bind(name)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Removes a migration's ledger entry after rollback. Runs on the
    /// migration's transaction connection.
    pub async fn record_rolled_back(
        &self,
        conn: &mut SqliteConnection,
        version: i64,
    ) -> Result<()> {
        let result = sqlx::query("DELETE FROM safe_migrations WHERE version = ?")
            .bind(version)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::MigrationNotFound { version });
        }

        Ok(())
    }

    /// Acquires the runner lock, failing fast if another runner holds it.
    pub async fn try_acquire_lock(&self) -> Result<()> {
        let result = sqlx::query("INSERT INTO safe_migrations_lock (id) VALUES (1)")
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(source) => {
                let held = source
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if held {
                    Err(MigrateError::ConcurrentMigration)
                } else {
                    Err(MigrateError::Database(source))
                }
            }
        }
    }

    /// Releases the runner lock.
    pub async fn release_lock(&self) -> Result<()> {
        sqlx::query("DELETE FROM safe_migrations_lock WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_applied_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime format fallback
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
