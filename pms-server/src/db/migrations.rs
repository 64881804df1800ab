//! Schema migrations
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so `run` is safe to call
//! on every startup.

use sqlx::SqlitePool;

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "sessions",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "organizations",
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "clients",
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id BLOB PRIMARY KEY,
            organization_id BLOB NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            contact_name TEXT,
            contact_email TEXT,
            phone TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "projects",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id BLOB PRIMARY KEY,
            organization_id BLOB NOT NULL REFERENCES organizations(id) ON DELETE RESTRICT,
            client_id BLOB REFERENCES clients(id) ON DELETE SET NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT,
            created_by BLOB NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (organization_id, code)
        )
        "#,
    ),
    (
        "project_members",
        r#"
        CREATE TABLE IF NOT EXISTS project_members (
            project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            allocation_percent INTEGER NOT NULL DEFAULT 100,
            joined_at TEXT NOT NULL,
            PRIMARY KEY (project_id, user_id)
        )
        "#,
    ),
    (
        "phases",
        r#"
        CREATE TABLE IF NOT EXISTS phases (
            id BLOB PRIMARY KEY,
            project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id BLOB PRIMARY KEY,
            project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            phase_id BLOB REFERENCES phases(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL,
            priority TEXT NOT NULL,
            assignee_id BLOB REFERENCES users(id) ON DELETE SET NULL,
            start_date TEXT,
            due_date TEXT,
            estimate_hours REAL,
            position INTEGER NOT NULL,
            created_by BLOB NOT NULL REFERENCES users(id),
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "tasks_board_index",
        "CREATE INDEX IF NOT EXISTS idx_tasks_board ON tasks (project_id, status, position)",
    ),
    (
        "tasks_assignee_index",
        "CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks (assignee_id)",
    ),
    (
        "task_dependencies",
        r#"
        CREATE TABLE IF NOT EXISTS task_dependencies (
            task_id BLOB NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            depends_on_id BLOB NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            PRIMARY KEY (task_id, depends_on_id)
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id BLOB PRIMARY KEY,
            task_id BLOB NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            author_id BLOB NOT NULL REFERENCES users(id),
            body TEXT NOT NULL,
            edited INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "attachments",
        r#"
        CREATE TABLE IF NOT EXISTS attachments (
            id BLOB PRIMARY KEY,
            project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            task_id BLOB REFERENCES tasks(id) ON DELETE SET NULL,
            uploaded_by BLOB NOT NULL REFERENCES users(id),
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "decisions",
        r#"
        CREATE TABLE IF NOT EXISTS decisions (
            id BLOB PRIMARY KEY,
            project_id BLOB NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            status TEXT NOT NULL,
            rationale TEXT,
            decided_by BLOB REFERENCES users(id),
            decided_at TEXT,
            created_by BLOB NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
];

/// Run all migrations
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    for (name, statement) in SCHEMA {
        tracing::debug!(migration = name, "applying");
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run(&pool).await.unwrap();
        run(&pool).await.unwrap();

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(tables, 12);
    }
}
