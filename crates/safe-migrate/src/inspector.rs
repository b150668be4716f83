//! Live schema introspection.
//!
//! Read-only existence checks backing the catalog's preconditions. All
//! functions take the current connection (usually the migration's
//! transaction) so every check within one run sees the same snapshot.
//! Introspection failures map to [`MigrateError::SchemaQuery`] and
//! propagate without retry.

use sqlx::SqliteConnection;

use crate::error::{MigrateError, Result};

fn schema_query(source: sqlx::Error) -> MigrateError {
    MigrateError::SchemaQuery { source }
}

/// Returns whether a table with the given name exists.
pub async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(&mut *conn)
            .await
            .map_err(schema_query)?;
    Ok(row.is_some())
}

/// Returns whether a column exists on the given table.
///
/// A missing table yields `false`, not an error.
pub async fn column_exists(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
        .bind(table)
        .bind(column)
        .fetch_one(&mut *conn)
        .await
        .map_err(schema_query)?;
    Ok(row.0 > 0)
}

/// Returns whether an index matching the given shape exists.
///
/// With an explicit `name`, the lookup is by name on the table. Otherwise
/// the index must cover exactly `columns` in order; `unique` further
/// constrains the match when set.
pub async fn index_exists(
    conn: &mut SqliteConnection,
    table: &str,
    columns: &[String],
    unique: Option<bool>,
    name: Option<&str>,
) -> Result<bool> {
    if let Some(name) = name {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ? AND tbl_name = ?",
        )
        .bind(name)
        .bind(table)
        .fetch_optional(&mut *conn)
        .await
        .map_err(schema_query)?;
        return Ok(row.is_some());
    }

    let indexes: Vec<(String, i64)> =
        sqlx::query_as("SELECT name, \"unique\" FROM pragma_index_list(?)")
            .bind(table)
            .fetch_all(&mut *conn)
            .await
            .map_err(schema_query)?;

    for (index_name, index_unique) in indexes {
        if let Some(unique) = unique {
            if (index_unique != 0) != unique {
                continue;
            }
        }

        // Expression index members have a NULL column name; those never
        // match a plain column list.
        let members: Vec<(Option<String>,)> =
            sqlx::query_as("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&index_name)
                .fetch_all(&mut *conn)
                .await
                .map_err(schema_query)?;

        let member_names: Vec<String> = members.into_iter().filter_map(|(n,)| n).collect();
        if member_names == columns {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Returns whether a foreign key from `from_table` to `to_table` exists,
/// optionally constrained to a specific referencing column.
pub async fn foreign_key_exists(
    conn: &mut SqliteConnection,
    from_table: &str,
    to_table: &str,
    column: Option<&str>,
) -> Result<bool> {
    let count: (i64,) = if let Some(column) = column {
        sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_foreign_key_list(?) \
             WHERE \"table\" = ? AND \"from\" = ?",
        )
        .bind(from_table)
        .bind(to_table)
        .bind(column)
        .fetch_one(&mut *conn)
        .await
        .map_err(schema_query)?
    } else {
        sqlx::query_as("SELECT COUNT(*) FROM pragma_foreign_key_list(?) WHERE \"table\" = ?")
            .bind(from_table)
            .bind(to_table)
            .fetch_one(&mut *conn)
            .await
            .map_err(schema_query)?
    };
    Ok(count.0 > 0)
}

/// Returns whether a named check constraint exists on the table.
///
/// SQLite does not expose check constraints through a pragma; named
/// constraints are matched against the table's stored CREATE statement.
pub async fn check_constraint_exists(
    conn: &mut SqliteConnection,
    table: &str,
    name: &str,
) -> Result<bool> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(&mut *conn)
            .await
            .map_err(schema_query)?;

    let Some((Some(create_sql),)) = row else {
        return Ok(false);
    };
    Ok(create_sql.contains(&format!("CONSTRAINT \"{name}\""))
        || create_sql.contains(&format!("CONSTRAINT {name} ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    async fn setup(pool: &SqlitePool) {
        sqlx::query(
            "CREATE TABLE \"users\" (\
               \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\
               \"email\" TEXT,\
               \"price\" INTEGER,\
               CONSTRAINT \"price_positive\" CHECK (\"price\" > 0)\
             )",
        )
        .execute(pool)
        .await
        .unwrap();

        sqlx::query("CREATE UNIQUE INDEX \"index_users_on_email\" ON \"users\" (\"email\")")
            .execute(pool)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE \"posts\" (\
               \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\
               \"user_id\" INTEGER REFERENCES \"users\" (\"id\")\
             )",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_table_exists() {
        let pool = create_test_pool().await;
        setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(table_exists(&mut conn, "users").await.unwrap());
        assert!(!table_exists(&mut conn, "missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_column_exists() {
        let pool = create_test_pool().await;
        setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(column_exists(&mut conn, "users", "email").await.unwrap());
        assert!(!column_exists(&mut conn, "users", "missing").await.unwrap());
        // Missing table reads as "column absent", not an error.
        assert!(!column_exists(&mut conn, "missing", "email").await.unwrap());
    }

    #[tokio::test]
    async fn test_index_exists_by_columns() {
        let pool = create_test_pool().await;
        setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let email = vec!["email".to_string()];
        assert!(index_exists(&mut conn, "users", &email, None, None)
            .await
            .unwrap());
        assert!(index_exists(&mut conn, "users", &email, Some(true), None)
            .await
            .unwrap());
        // Uniqueness mismatch is not a match.
        assert!(!index_exists(&mut conn, "users", &email, Some(false), None)
            .await
            .unwrap());

        let other = vec!["id".to_string()];
        assert!(!index_exists(&mut conn, "users", &other, None, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_index_exists_by_name() {
        let pool = create_test_pool().await;
        setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(
            index_exists(&mut conn, "users", &[], None, Some("index_users_on_email"))
                .await
                .unwrap()
        );
        assert!(!index_exists(&mut conn, "users", &[], None, Some("nope"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_foreign_key_exists() {
        let pool = create_test_pool().await;
        setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(foreign_key_exists(&mut conn, "posts", "users", None)
            .await
            .unwrap());
        assert!(
            foreign_key_exists(&mut conn, "posts", "users", Some("user_id"))
                .await
                .unwrap()
        );
        assert!(
            !foreign_key_exists(&mut conn, "posts", "users", Some("author_id"))
                .await
                .unwrap()
        );
        assert!(!foreign_key_exists(&mut conn, "users", "posts", None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_check_constraint_exists() {
        let pool = create_test_pool().await;
        setup(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(
            check_constraint_exists(&mut conn, "users", "price_positive")
                .await
                .unwrap()
        );
        assert!(!check_constraint_exists(&mut conn, "users", "other")
            .await
            .unwrap());
        assert!(!check_constraint_exists(&mut conn, "missing", "any")
            .await
            .unwrap());
    }
}
