//! Repositories, one per entity
//!
//! Each repository borrows the pool; construct one per request:
//! `TaskRepo::new(&state.pool).get(id).await?`

pub mod attachments;
pub mod clients;
pub mod comments;
pub mod decisions;
pub mod dependencies;
pub mod members;
pub mod organizations;
pub mod phases;
pub mod projects;
pub mod reports;
pub mod sessions;
pub mod tasks;
pub mod users;

pub use attachments::{Attachment, AttachmentRepo, NewAttachment};
pub use clients::{Client, ClientFields, ClientRepo};
pub use comments::{Comment, CommentRepo, CommentWithAuthor};
pub use decisions::{Decision, DecisionChanges, DecisionRepo, NewDecision};
pub use dependencies::{DependencyRepo, TaskDependency};
pub use members::{MemberChanges, MemberRepo, MemberWithUser, ProjectMember};
pub use organizations::{Organization, OrganizationFields, OrganizationRepo, OrganizationWithCounts};
pub use phases::{Phase, PhaseFields, PhaseRepo};
pub use projects::{NewProject, Project, ProjectChanges, ProjectFilter, ProjectRepo};
pub use reports::{PortfolioRow, ReportRepo};
pub use sessions::SessionRepo;
pub use tasks::{NewTask, Task, TaskChanges, TaskFilter, TaskRepo};
pub use users::{User, UserChanges, UserRepo};

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use super::DbError;
use crate::models::{Paginated, Pagination};

/// `%q%` for a LIKE filter, or `None` when the query is blank.
pub(crate) fn search_pattern(q: Option<&str>) -> Option<String> {
    match q.map(str::trim) {
        None | Some("") => None,
        Some(q) => Some(format!("%{q}%")),
    }
}

/// Decode a page of rows that carry a `COUNT(*) OVER() AS total` column.
///
/// A page past the end has no rows and therefore reports a total of 0.
pub(crate) fn paginate<T>(rows: Vec<SqliteRow>, page: Pagination) -> Result<Paginated<T>, DbError>
where
    T: for<'r> FromRow<'r, SqliteRow>,
{
    let total = match rows.first() {
        Some(row) => row.try_get::<i64, _>("total")?,
        None => 0,
    };

    let items = rows
        .iter()
        .map(T::from_row)
        .collect::<Result<Vec<T>, sqlx::Error>>()?;

    Ok(page.wrap(items, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some(" web ")), Some("%web%".to_owned()));
    }
}
