//! Session repository
//!
//! Only the sha256 of a session token is stored.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::users::{User, USER_COLUMNS};
use super::DbError;

/// Session repository
pub struct SessionRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a token hash to its user if the session is unexpired and the
    /// user is still active.
    pub async fn find_user(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ? AND u.active = 1
            "#
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn delete(&self, token_hash: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool)
            .await?;
        if result.rows_affected() > 0 {
            tracing::debug!(purged = result.rows_affected(), "expired sessions removed");
        }
        Ok(result.rows_affected())
    }
}
