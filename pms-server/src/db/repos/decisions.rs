//! Decision log repository
//!
//! Status changes go through `transition`, which enforces the allowed
//! decision lifecycle and records who decided and when.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::DbError;
use crate::models::{DecisionStatus, Paginated, Pagination, Title};

/// Decision record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Decision {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: DecisionStatus,
    pub rationale: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDecision {
    pub title: Title,
    pub description: Option<String>,
    pub rationale: Option<String>,
}

/// Replacement text fields; status is only changed by `transition`.
pub type DecisionChanges = NewDecision;

const COLUMNS: &str = "id, project_id, title, description, status, rationale, decided_by, decided_at, \
                       created_by, created_at, updated_at";

/// Decision repository
pub struct DecisionRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DecisionRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project_id: Uuid, created_by: Uuid, new: NewDecision) -> Result<Decision, DbError> {
        let now = Utc::now();
        let decision: Decision = sqlx::query_as(&format!(
            r#"
            INSERT INTO decisions
                (id, project_id, title, description, status, rationale, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(new.title.as_str())
        .bind(&new.description)
        .bind(DecisionStatus::Proposed)
        .bind(&new.rationale)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        tracing::debug!(decision_id = %decision.id, %project_id, "decision proposed");
        Ok(decision)
    }

    pub async fn get(&self, id: Uuid) -> Result<Decision, DbError> {
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM decisions WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("decision", id))
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        status: Option<DecisionStatus>,
        page: Pagination,
    ) -> Result<Paginated<Decision>, DbError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {COLUMNS}, COUNT(*) OVER() AS total FROM decisions WHERE project_id = "
        ));
        qb.push_bind(project_id);

        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build().fetch_all(self.pool).await?;
        super::paginate(rows, page)
    }

    pub async fn update(&self, id: Uuid, changes: DecisionChanges) -> Result<Decision, DbError> {
        sqlx::query_as(&format!(
            r#"
            UPDATE decisions
            SET title = ?, description = ?, rationale = ?, updated_at = ?
            WHERE id = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(changes.title.as_str())
        .bind(&changes.description)
        .bind(&changes.rationale)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("decision", id))
    }

    /// Move a decision to `next`. Accepting or rejecting records the actor and
    /// time; a `rationale` replaces the stored one when given.
    pub async fn transition(
        &self,
        id: Uuid,
        next: DecisionStatus,
        actor: Uuid,
        rationale: Option<String>,
    ) -> Result<Decision, DbError> {
        let current = self.get(id).await?;

        if !current.status.can_transition_to(next) {
            return Err(DbError::Conflict(format!(
                "decision cannot move from {} to {}",
                current.status, next
            )));
        }

        let decides = matches!(next, DecisionStatus::Accepted | DecisionStatus::Rejected);
        let now = Utc::now();
        let (decided_by, decided_at) = if decides {
            (Some(actor), Some(now))
        } else {
            (current.decided_by, current.decided_at)
        };

        // Guarded on the status read above.
        let decision: Option<Decision> = sqlx::query_as(&format!(
            r#"
            UPDATE decisions
            SET status = ?, rationale = COALESCE(?, rationale), decided_by = ?, decided_at = ?, updated_at = ?
            WHERE id = ? AND status = ?
            RETURNING {COLUMNS}
            "#
        ))
        .bind(next)
        .bind(rationale)
        .bind(decided_by)
        .bind(decided_at)
        .bind(now)
        .bind(id)
        .bind(current.status)
        .fetch_optional(self.pool)
        .await?;

        let decision = decision
            .ok_or_else(|| DbError::Conflict("decision was changed concurrently".into()))?;

        tracing::debug!(decision_id = %id, from = %current.status, to = %next, "decision transitioned");
        Ok(decision)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM decisions WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("decision", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_project, test_pool};

    fn proposal(title: &str) -> NewDecision {
        NewDecision {
            title: Title::new(title).unwrap(),
            description: None,
            rationale: None,
        }
    }

    #[tokio::test]
    async fn accept_then_supersede() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let repo = DecisionRepo::new(&pool);

        let decision = repo.create(project.id, owner.id, proposal("Use Postgres")).await.unwrap();
        assert_eq!(decision.status, DecisionStatus::Proposed);
        assert!(decision.decided_by.is_none());

        let accepted = repo
            .transition(decision.id, DecisionStatus::Accepted, owner.id, Some("team consensus".into()))
            .await
            .unwrap();
        assert_eq!(accepted.decided_by, Some(owner.id));
        assert!(accepted.decided_at.is_some());
        assert_eq!(accepted.rationale.as_deref(), Some("team consensus"));

        let superseded = repo
            .transition(decision.id, DecisionStatus::Superseded, owner.id, None)
            .await
            .unwrap();
        assert_eq!(superseded.status, DecisionStatus::Superseded);
        assert_eq!(superseded.decided_at, accepted.decided_at);
        assert_eq!(superseded.rationale.as_deref(), Some("team consensus"));
    }

    #[tokio::test]
    async fn invalid_transition_conflicts() {
        let pool = test_pool().await;
        let (project, owner) = seed_project(&pool, "web").await;
        let repo = DecisionRepo::new(&pool);

        let decision = repo.create(project.id, owner.id, proposal("Adopt GraphQL")).await.unwrap();
        repo.transition(decision.id, DecisionStatus::Rejected, owner.id, None)
            .await
            .unwrap();

        let err = repo
            .transition(decision.id, DecisionStatus::Accepted, owner.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(m) if m.contains("rejected")));
    }
}
