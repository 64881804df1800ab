//! Client repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{search_pattern, DbError};
use crate::models::{Name, Paginated, Pagination};

/// Client record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated client fields
#[derive(Debug, Clone)]
pub struct ClientFields {
    pub name: Name,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

const RETURNING: &str = "RETURNING id, organization_id, name, contact_name, contact_email, phone, notes, created_at, updated_at";

/// Client repository
pub struct ClientRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClientRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, organization_id: Uuid, fields: ClientFields) -> Result<Client, DbError> {
        let now = Utc::now();
        let client: Client = sqlx::query_as(&format!(
            r#"
            INSERT INTO clients
                (id, organization_id, name, contact_name, contact_email, phone, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            {RETURNING}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(fields.name.as_str())
        .bind(&fields.contact_name)
        .bind(&fields.contact_email)
        .bind(&fields.phone)
        .bind(&fields.notes)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::from(e).conflict_as("organization does not exist"))?;

        tracing::debug!(client_id = %client.id, %organization_id, "client created");
        Ok(client)
    }

    pub async fn get(&self, id: Uuid) -> Result<Client, DbError> {
        sqlx::query_as(
            r#"
            SELECT id, organization_id, name, contact_name, contact_email, phone, notes, created_at, updated_at
            FROM clients
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("client", id))
    }

    pub async fn list_for_organization(
        &self,
        organization_id: Uuid,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Paginated<Client>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT id, organization_id, name, contact_name, contact_email, phone, notes,
                   created_at, updated_at, COUNT(*) OVER() AS total
            FROM clients
            WHERE organization_id =
            "#,
        );
        qb.push_bind(organization_id);

        if let Some(pattern) = search_pattern(q) {
            qb.push(" AND name LIKE ").push_bind(pattern);
        }

        qb.push(" ORDER BY name ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    pub async fn update(&self, id: Uuid, fields: ClientFields) -> Result<Client, DbError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE clients
            SET name = ?, contact_name = ?, contact_email = ?, phone = ?, notes = ?, updated_at = ?
            WHERE id = ?
            {RETURNING}
            "#
        ))
        .bind(fields.name.as_str())
        .bind(&fields.contact_name)
        .bind(&fields.contact_email)
        .bind(&fields.phone)
        .bind(&fields.notes)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("client", id))
    }

    /// Delete a client. Projects keep existing with `client_id` cleared.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("client", id));
        }
        Ok(())
    }
}
