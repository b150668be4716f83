//! Error types for the migration engine.

/// Errors that can occur while inspecting, applying, or rolling back
/// schema migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Schema introspection failed (the existence check itself errored).
    ///
    /// Not retried locally; idempotency decisions cannot be made without
    /// a consistent view of the schema.
    #[error("schema introspection failed: {source}")]
    SchemaQuery {
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// A DDL statement was issued and failed despite its precondition
    /// holding (concurrent schema change, permissions, etc.).
    #[error("DDL execution failed for `{statement}`: {source}")]
    DdlExecution {
        /// The statement that failed.
        statement: String,
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// Rollback was requested for an operation with no safe inverse.
    #[error("operation is not invertible: {0}")]
    NotInvertible(String),

    /// Another runner holds the migration lock. Retry later.
    #[error("another migration runner holds the lock")]
    ConcurrentMigration,

    /// A ledger entry was expected but not found.
    #[error("migration {version} not found in the ledger")]
    MigrationNotFound {
        /// The missing migration's version.
        version: i64,
    },

    /// Database error outside DDL execution (transactions, ledger reads).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
