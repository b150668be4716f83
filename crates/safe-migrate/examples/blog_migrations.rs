//! Example: Blog Application Migrations
//!
//! This example demonstrates how to use safe-migrate to manage database
//! schema changes for a blog application with users, posts, and comments,
//! including the re-run and rollback behavior.
//!
//! Run with: cargo run --example blog_migrations -p safe-migrate

use safe_migrate::prelude::*;
use safe_migrate::Migration;

// =============================================================================
// Migration Definitions
// =============================================================================

/// Initial migration: Create users table
struct CreateUsers;

impl Migration for CreateUsers {
    const VERSION: i64 = 20240101_120000;
    const NAME: &'static str = "create_users";

    fn change() -> Vec<Operation> {
        vec![
            Operation::create_table(
                "users",
                TableDefinition::new()
                    .column(
                        "username",
                        SqlType::Varchar(100),
                        ColumnOptions::new().not_null().unique(),
                    )
                    .column(
                        "email",
                        SqlType::Varchar(255),
                        ColumnOptions::new().not_null(),
                    )
                    .column(
                        "is_active",
                        SqlType::Boolean,
                        ColumnOptions::new()
                            .not_null()
                            .default_value(DefaultValue::Bool(true)),
                    )
                    .timestamps(),
            ),
            Operation::add_index("users", "email", IndexOptions::new().unique()),
        ]
    }
}

/// Second migration: Create posts table
struct CreatePosts;

impl Migration for CreatePosts {
    const VERSION: i64 = 20240102_090000;
    const NAME: &'static str = "create_posts";

    fn change() -> Vec<Operation> {
        vec![
            Operation::create_table(
                "posts",
                TableDefinition::new()
                    .column(
                        "title",
                        SqlType::Varchar(200),
                        ColumnOptions::new().not_null(),
                    )
                    .text("content")
                    .column(
                        "is_published",
                        SqlType::Boolean,
                        ColumnOptions::new()
                            .not_null()
                            .default_value(DefaultValue::Bool(false)),
                    )
                    .timestamps(),
            ),
            // author_id column plus its lookup index
            Operation::add_reference("posts", "author", ReferenceOptions::new()),
        ]
    }
}

/// Third migration: Create comments table
struct CreateComments;

impl Migration for CreateComments {
    const VERSION: i64 = 20240103_150000;
    const NAME: &'static str = "create_comments";

    fn change() -> Vec<Operation> {
        vec![
            Operation::create_table(
                "comments",
                TableDefinition::new()
                    .text("content")
                    .column(
                        "is_approved",
                        SqlType::Boolean,
                        ColumnOptions::new()
                            .not_null()
                            .default_value(DefaultValue::Bool(false)),
                    )
                    .timestamps(),
            ),
            Operation::add_reference("comments", "post", ReferenceOptions::new()),
            Operation::add_reference("comments", "author", ReferenceOptions::new()),
        ]
    }
}

/// Fourth migration: Add a slug column together with its unique index
struct AddSlugToPosts;

impl Migration for AddSlugToPosts {
    const VERSION: i64 = 20240104_100000;
    const NAME: &'static str = "add_slug_to_posts";

    fn change() -> Vec<Operation> {
        vec![Operation::add_column_and_index(
            "posts",
            "slug",
            SqlType::Varchar(200),
            ColumnOptions::new(),
            IndexOptions::new().unique(),
        )]
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(70));
    println!(" SAFE-MIGRATE: Blog Application Example");
    println!("{}", "=".repeat(70));
    println!();

    // Create in-memory SQLite database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;

    // Create runner with SQLite dialect
    let runner = MigrationRunner::new(pool.clone(), SqliteDialect::new());

    // Initialize (create ledger and lock tables)
    println!("[1] Initializing migration system...");
    runner.init().await?;
    println!("    Created safe_migrations and safe_migrations_lock tables\n");

    let plans = vec![
        CreateUsers::plan(),
        CreatePosts::plan(),
        CreateComments::plan(),
        AddSlugToPosts::plan(),
    ];

    // Show pending migrations
    println!("[2] Checking pending migrations...");
    let pending = runner.pending(&plans).await?;
    println!("    {} migrations pending:\n", pending.len());
    for plan in &pending {
        println!("    - {} {}", plan.version, plan.name);
    }
    println!();

    // Show SQL for each migration (dry run)
    println!("[3] Generated SQL for migrations:");
    println!("{}", "-".repeat(70));
    for plan in &plans {
        println!("\n-- Migration: {} {}", plan.version, plan.name);
        for sql in runner.sql_for(plan) {
            println!("{sql};");
        }
    }
    println!();
    println!("{}", "-".repeat(70));
    println!();

    // Apply all migrations, reporting the apply/skip decision per step
    println!("[4] Applying migrations...\n");
    for plan in &plans {
        println!("    Applying {} {}...", plan.version, plan.name);
        let steps = runner.apply(plan).await?;
        for step in &steps {
            let mark = if step.applied { "applied" } else { "skipped" };
            println!("      [{mark}] {}", step.operation.description());
        }
    }
    println!();

    // Re-running is a no-op: the ledger already records every migration
    println!("[5] Re-running all migrations (idempotency check)...\n");
    for plan in &plans {
        let steps = runner.apply(plan).await?;
        println!(
            "    {} {}: {} steps executed",
            plan.version,
            plan.name,
            steps.len()
        );
    }
    println!();

    // Verify the ledger
    println!("[6] Verifying applied migrations...\n");
    let entries = runner.ledger().entries().await?;
    println!("    {} migrations applied:", entries.len());
    for entry in &entries {
        println!(
            "    [X] {} {} ({})",
            entry.version,
            entry.name,
            entry.applied_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();

    // Demonstrate rollback: the inverse is derived from the declaration
    println!("[7] Demonstrating rollback...\n");
    let last = &plans[3]; // add_slug_to_posts
    println!("    Rollback SQL for {} {}:", last.version, last.name);
    for sql in runner.rollback_sql_for(last)? {
        println!("      {sql};");
    }
    let steps = runner.rollback(last).await?;
    println!("    Rolled back, {} inverse steps executed\n", steps.len());

    // Show final state
    println!("[8] Final migration state:\n");
    for (plan, status) in runner.status(&plans).await? {
        let mark = match status {
            MigrationStatus::Applied => "X",
            MigrationStatus::Pending => " ",
        };
        println!("    [{mark}] {} {}", plan.version, plan.name);
    }
    println!();

    // Re-apply the rolled back migration
    println!("[9] Re-applying {}...", last.name);
    runner.apply(last).await?;
    println!("    OK\n");

    println!("{}", "=".repeat(70));
    println!(" Example completed successfully!");
    println!("{}", "=".repeat(70));

    Ok(())
}
