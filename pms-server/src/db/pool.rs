//! Database connection pool management
//!
//! Uses an sqlx `SqlitePool` with explicit connection limits.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Default maximum connections for the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Create a SQLite connection pool.
///
/// The database file (and its parent directory) is created if missing.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool("sqlite://pms.db").await?;
/// ```
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Create a SQLite connection pool with a custom connection limit.
///
/// In-memory databases live only as long as their connection, so they get
/// exactly one connection that is never recycled.
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    if is_in_memory(database_url) {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;
    }

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options.journal_mode(SqliteJournalMode::Wal))
        .await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_acquires_connection() {
        let pool = create_pool("sqlite::memory:").await.expect("pool creation failed");

        let result: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("query failed");

        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn foreign_keys_enabled() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn file_pool_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pms.db");
        let url = format!("sqlite://{}", path.display());

        let pool = create_pool(&url).await.expect("pool creation failed");
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn concurrent_pool_access() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("pms.db").display());
        let pool = create_pool(&url).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let result: (i64,) = sqlx::query_as("SELECT ?")
                        .bind(i as i64)
                        .fetch_one(&pool)
                        .await
                        .expect("concurrent query failed");
                    result.0
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.expect("task panicked");
            assert_eq!(result, i as i64);
        }
    }
}
