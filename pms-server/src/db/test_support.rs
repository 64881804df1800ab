//! Fixtures shared by repository and router tests

use sqlx::SqlitePool;
use uuid::Uuid;

use super::{create_pool, migrations, NewProject, NewTask, Organization, OrganizationFields, Project, Task, User};
use super::{OrganizationRepo, ProjectRepo, TaskRepo, UserRepo};
use crate::models::{Code, Email, Name, Priority, ProjectStatus, Role, TaskStatus, Title};

/// Fresh in-memory database with the schema applied.
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.expect("in-memory pool");
    migrations::run(&pool).await.expect("migrations");
    pool
}

pub(crate) async fn seed_org(pool: &SqlitePool, code: &str) -> Organization {
    OrganizationRepo::new(pool)
        .create(OrganizationFields {
            name: Name::new(&code.to_uppercase()).unwrap(),
            code: Code::new(code).unwrap(),
            description: None,
        })
        .await
        .unwrap()
}

/// User with a placeholder hash; use the auth helpers when a login is needed.
pub(crate) async fn seed_user(pool: &SqlitePool, email: &str, role: Role) -> User {
    let display_name = email.split('@').next().unwrap_or(email);
    UserRepo::new(pool)
        .create(
            &Email::new(email).unwrap(),
            &Name::new(display_name).unwrap(),
            role,
            "not-a-real-hash",
        )
        .await
        .unwrap()
}

/// Project in a fresh organization, owned by a new PM.
pub(crate) async fn seed_project(pool: &SqlitePool, code: &str) -> (Project, User) {
    let org = seed_org(pool, &format!("org-{code}")).await;
    let owner = seed_user(pool, &format!("owner-{code}@acme.test"), Role::Pm).await;
    let project = ProjectRepo::new(pool)
        .create_with_owner(
            NewProject {
                organization_id: org.id,
                client_id: None,
                code: Code::new(code).unwrap(),
                name: Name::new(&format!("Project {code}")).unwrap(),
                description: None,
                status: ProjectStatus::Active,
                start_date: None,
                end_date: None,
            },
            owner.id,
        )
        .await
        .unwrap();
    (project, owner)
}

pub(crate) fn new_task(title: &str) -> NewTask {
    NewTask {
        phase_id: None,
        title: Title::new(title).unwrap(),
        description: None,
        status: TaskStatus::Todo,
        priority: Priority::Medium,
        assignee_id: None,
        start_date: None,
        due_date: None,
        estimate_hours: None,
    }
}

pub(crate) async fn seed_task(
    pool: &SqlitePool,
    project_id: Uuid,
    created_by: Uuid,
    title: &str,
    status: TaskStatus,
    assignee_id: Option<Uuid>,
) -> Task {
    TaskRepo::new(pool)
        .create(
            project_id,
            created_by,
            NewTask {
                status,
                assignee_id,
                ..new_task(title)
            },
        )
        .await
        .unwrap()
}
