//! User repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{search_pattern, DbError};
use crate::models::{Email, Name, Paginated, Pagination, Role};

/// User record from database. The password hash never leaves the server.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub display_name: Option<Name>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub password_hash: Option<String>,
}

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.email, u.display_name, u.role, u.password_hash, u.active, u.created_at, u.updated_at";

/// User repository
pub struct UserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        email: &Email,
        display_name: &Name,
        role: Role,
        password_hash: &str,
    ) -> Result<User, DbError> {
        let now = Utc::now();
        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, display_name, role, password_hash, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING id, email, display_name, role, password_hash, active, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email.as_str())
        .bind(display_name.as_str())
        .bind(role)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).conflict_as("email already registered"))?;

        tracing::debug!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, DbError> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        user.ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list(&self, q: Option<&str>, page: Pagination) -> Result<Paginated<User>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS}, COUNT(*) OVER() AS total FROM users u WHERE 1 = 1"
        ));

        if let Some(pattern) = search_pattern(q) {
            qb.push(" AND (u.email LIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.display_name LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY u.display_name ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    pub async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User, DbError> {
        let current = self.get(id).await?;

        let display_name = changes
            .display_name
            .map(Name::into_string)
            .unwrap_or(current.display_name);
        let role = changes.role.unwrap_or(current.role);
        let active = changes.active.unwrap_or(current.active);
        let password_hash = changes.password_hash.unwrap_or(current.password_hash);

        let user: User = sqlx::query_as(
            r#"
            UPDATE users
            SET display_name = ?, role = ?, active = ?, password_hash = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, email, display_name, role, password_hash, active, created_at, updated_at
            "#,
        )
        .bind(&display_name)
        .bind(role)
        .bind(active)
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(user)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
