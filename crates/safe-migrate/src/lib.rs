//! Idempotent, reversible schema migrations for Rust.
//!
//! `safe-migrate` runs schema migrations that check live database state
//! before every step, where:
//! - Each operation carries a precondition and becomes a no-op when the
//!   target state is already in place (partially applied migrations can
//!   be re-run safely)
//! - Operations are reversible by structural inversion, and one-way
//!   operations are rejected before any rollback DDL is issued
//! - An applied-migration ledger and a runner lock keep concurrent
//!   deployments from racing each other
//!
//! # Architecture
//!
//! The migration system consists of several components:
//!
//! - **Operations** - Schema changes like `CreateTable`, `AddColumn`,
//!   `AddColumnAndIndex`, etc.
//! - **Catalog** - Maps each operation to its idempotency precondition
//!   and its inverse
//! - **Inspector** - Answers existence queries against live schema state
//! - **Executor** - Runs one step at a time, applying or skipping it
//! - **Runner** - Wraps a migration in a transaction, takes the runner
//!   lock, and updates the ledger
//! - **Dialect** - Database-specific SQL generation
//!
//! # Example
//!
//! ```rust,ignore
//! use safe_migrate::prelude::*;
//!
//! pub struct CreateUsers;
//!
//! impl Migration for CreateUsers {
//!     const VERSION: i64 = 20240101_120000;
//!     const NAME: &'static str = "create_users";
//!
//!     fn change() -> Vec<Operation> {
//!         vec![
//!             Operation::create_table(
//!                 "users",
//!                 TableDefinition::new()
//!                     .string("name")
//!                     .column(
//!                         "email",
//!                         SqlType::Varchar(255),
//!                         ColumnOptions::new().not_null(),
//!                     )
//!                     .timestamps(),
//!             ),
//!             Operation::add_index("users", "email", IndexOptions::new().unique()),
//!         ]
//!     }
//! }
//!
//! let runner = MigrationRunner::new(pool, SqliteDialect::new());
//! runner.init().await?;
//! runner.apply(&CreateUsers::plan()).await?;
//! ```

pub mod catalog;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod inspector;
pub mod ledger;
pub mod operations;
pub mod runner;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::Precondition;
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{MigrationStep, StepExecutor, StepResult};
    pub use crate::ledger::{LedgerEntry, MigrationLedger};
    pub use crate::operations::Operation;
    pub use crate::runner::{
        Direction, MigrationPlan, MigrationRunner, MigrationStatus,
    };
    pub use crate::schema::{
        ColumnOptions, DefaultValue, ForeignKeyOptions, IndexOptions, ReferenceOptions,
        SqlType, TableDefinition,
    };
    pub use crate::Migration;
}

/// Trait for migrations defined in Rust code.
///
/// This trait is implemented by migration structs to declare schema
/// changes. The same declaration drives both directions: the runner
/// derives the rollback by inverting each operation.
pub trait Migration {
    /// Migration version, unique across the project (e.g. a timestamp
    /// like `20240101_120000`).
    const VERSION: i64;

    /// Migration name (e.g. "create_users", "add_email_to_users").
    const NAME: &'static str;

    /// Returns the declared operations.
    fn change() -> Vec<operations::Operation>;

    /// Converts to a runnable plan.
    fn plan() -> runner::MigrationPlan {
        runner::MigrationPlan::new(Self::VERSION, Self::NAME).operations(Self::change())
    }
}
