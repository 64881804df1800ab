//! Dashboard and portfolio aggregation
//!
//! Pure functions over rows already loaded from the database.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{MemberWithUser, Phase, PortfolioRow, Task};
use crate::models::{Priority, ProjectStatus, TaskStatus};

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDashboard {
    pub project_id: Uuid,
    pub total_tasks: usize,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
    /// Done share of all non-cancelled tasks, 0..=100
    pub completion_percent: f64,
    pub estimate_hours: f64,
    pub estimate_hours_done: f64,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub phases: Vec<PhaseProgress>,
    pub workload: Vec<AssigneeLoad>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseProgress {
    pub phase_id: Uuid,
    pub name: String,
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub completion_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssigneeLoad {
    pub user_id: Uuid,
    pub display_name: String,
    pub allocation_percent: i64,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
    pub open_estimate_hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioProject {
    #[serde(flatten)]
    pub row: PortfolioRow,
    pub completion_percent: f64,
    /// Open project with overdue tasks or past its end date
    pub at_risk: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub project_count: usize,
    pub by_status: BTreeMap<ProjectStatus, usize>,
    pub total_tasks: i64,
    pub overdue_tasks: i64,
    pub at_risk_projects: usize,
    pub completion_percent: f64,
    pub projects: Vec<PortfolioProject>,
}

fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    !task.status.is_closed() && task.due_date.is_some_and(|due| due < today)
}

/// `done / (total - cancelled)` as a percentage with one decimal.
pub fn completion_percent(done: i64, total: i64, cancelled: i64) -> f64 {
    let relevant = total - cancelled;
    if relevant <= 0 {
        return 0.0;
    }
    let percent = done as f64 * 100.0 / relevant as f64;
    (percent * 10.0).round() / 10.0
}

pub fn project_dashboard(
    project_id: Uuid,
    tasks: &[Task],
    phases: &[Phase],
    members: &[MemberWithUser],
    today: NaiveDate,
) -> ProjectDashboard {
    let mut by_status: BTreeMap<TaskStatus, usize> = TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_priority: BTreeMap<Priority, usize> = Priority::ALL.iter().map(|p| (*p, 0)).collect();
    let mut estimate_hours = 0.0;
    let mut estimate_hours_done = 0.0;

    for task in tasks {
        *by_status.entry(task.status).or_default() += 1;
        *by_priority.entry(task.priority).or_default() += 1;
        if task.status != TaskStatus::Cancelled {
            let hours = task.estimate_hours.unwrap_or(0.0);
            estimate_hours += hours;
            if task.status == TaskStatus::Done {
                estimate_hours_done += hours;
            }
        }
    }

    let done = by_status[&TaskStatus::Done];
    let cancelled = by_status[&TaskStatus::Cancelled];

    let phases = phases
        .iter()
        .map(|phase| {
            let in_phase: Vec<&Task> = tasks.iter().filter(|t| t.phase_id == Some(phase.id)).collect();
            let done = in_phase.iter().filter(|t| t.status == TaskStatus::Done).count();
            let cancelled = in_phase.iter().filter(|t| t.status == TaskStatus::Cancelled).count();
            PhaseProgress {
                phase_id: phase.id,
                name: phase.name.clone(),
                total_tasks: in_phase.len(),
                done_tasks: done,
                completion_percent: completion_percent(done as i64, in_phase.len() as i64, cancelled as i64),
            }
        })
        .collect();

    let mut open_by_assignee: HashMap<Uuid, Vec<&Task>> = HashMap::new();
    for task in tasks.iter().filter(|t| !t.status.is_closed()) {
        if let Some(assignee) = task.assignee_id {
            open_by_assignee.entry(assignee).or_default().push(task);
        }
    }

    let workload = members
        .iter()
        .map(|m| {
            let open = open_by_assignee.get(&m.member.user_id).map(Vec::as_slice).unwrap_or(&[]);
            AssigneeLoad {
                user_id: m.member.user_id,
                display_name: m.display_name.clone(),
                allocation_percent: m.member.allocation_percent,
                open_tasks: open.len(),
                overdue_tasks: open.iter().filter(|t| is_overdue(t, today)).count(),
                open_estimate_hours: open.iter().filter_map(|t| t.estimate_hours).sum(),
            }
        })
        .collect();

    ProjectDashboard {
        project_id,
        total_tasks: tasks.len(),
        open_tasks: tasks.iter().filter(|t| !t.status.is_closed()).count(),
        overdue_tasks: tasks.iter().filter(|t| is_overdue(t, today)).count(),
        completion_percent: completion_percent(done as i64, tasks.len() as i64, cancelled as i64),
        estimate_hours,
        estimate_hours_done,
        by_status,
        by_priority,
        phases,
        workload,
    }
}

pub fn portfolio(rows: Vec<PortfolioRow>, today: NaiveDate) -> Portfolio {
    let mut by_status: BTreeMap<ProjectStatus, usize> = BTreeMap::new();
    let mut total_tasks = 0;
    let mut done_tasks = 0;
    let mut cancelled_tasks = 0;
    let mut overdue_tasks = 0;

    let projects: Vec<PortfolioProject> = rows
        .into_iter()
        .map(|row| {
            *by_status.entry(row.status).or_default() += 1;
            total_tasks += row.total_tasks;
            done_tasks += row.done_tasks;
            cancelled_tasks += row.cancelled_tasks;
            overdue_tasks += row.overdue_tasks;

            let open = !matches!(row.status, ProjectStatus::Completed | ProjectStatus::Cancelled);
            let late = row.end_date.is_some_and(|end| end < today);
            PortfolioProject {
                completion_percent: completion_percent(row.done_tasks, row.total_tasks, row.cancelled_tasks),
                at_risk: open && (row.overdue_tasks > 0 || late),
                row,
            }
        })
        .collect();

    Portfolio {
        project_count: projects.len(),
        by_status,
        total_tasks,
        overdue_tasks,
        at_risk_projects: projects.iter().filter(|p| p.at_risk).count(),
        completion_percent: completion_percent(done_tasks, total_tasks, cancelled_tasks),
        projects,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::ProjectMember;
    use crate::models::{PhaseStatus, Role};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn task(status: TaskStatus, due: Option<NaiveDate>, hours: Option<f64>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            phase_id: None,
            title: "t".into(),
            description: None,
            status,
            priority: Priority::Medium,
            assignee_id: None,
            start_date: None,
            due_date: due,
            estimate_hours: hours,
            position: 0,
            created_by: Uuid::nil(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn completion_ignores_cancelled() {
        assert_eq!(completion_percent(1, 4, 2), 50.0);
        assert_eq!(completion_percent(0, 0, 0), 0.0);
        assert_eq!(completion_percent(0, 3, 3), 0.0);
        assert_eq!(completion_percent(1, 3, 0), 33.3);
    }

    #[test]
    fn dashboard_counts() {
        let today = day(15);
        let tasks = vec![
            task(TaskStatus::Todo, Some(day(14)), Some(3.0)),
            task(TaskStatus::InProgress, Some(day(15)), Some(2.0)),
            task(TaskStatus::Done, Some(day(1)), Some(5.0)),
            task(TaskStatus::Cancelled, Some(day(1)), Some(40.0)),
        ];

        let dash = project_dashboard(Uuid::nil(), &tasks, &[], &[], today);

        assert_eq!(dash.total_tasks, 4);
        assert_eq!(dash.open_tasks, 2);
        assert_eq!(dash.overdue_tasks, 1);
        assert_eq!(dash.completion_percent, 33.3);
        assert_eq!(dash.estimate_hours, 10.0);
        assert_eq!(dash.estimate_hours_done, 5.0);
        assert_eq!(dash.by_status[&TaskStatus::InReview], 0);
        assert_eq!(dash.by_priority[&Priority::Medium], 4);
    }

    #[test]
    fn phase_progress_and_workload() {
        let now = Utc::now();
        let phase = Phase {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            name: "Build".into(),
            description: None,
            status: PhaseStatus::InProgress,
            start_date: None,
            end_date: None,
            position: 0,
            created_at: now,
            updated_at: now,
        };
        let dev = Uuid::new_v4();
        let member = MemberWithUser {
            member: ProjectMember {
                project_id: Uuid::nil(),
                user_id: dev,
                role: Role::Developer,
                allocation_percent: 50,
                joined_at: now,
            },
            email: "dev@acme.test".into(),
            display_name: "Dev".into(),
        };

        let mut a = task(TaskStatus::Done, None, None);
        a.phase_id = Some(phase.id);
        let mut b = task(TaskStatus::InProgress, Some(day(10)), Some(6.0));
        b.phase_id = Some(phase.id);
        b.assignee_id = Some(dev);
        let c = task(TaskStatus::Todo, None, None);

        let dash = project_dashboard(Uuid::nil(), &[a, b, c], &[phase], &[member], day(15));

        assert_eq!(dash.phases[0].total_tasks, 2);
        assert_eq!(dash.phases[0].done_tasks, 1);
        assert_eq!(dash.phases[0].completion_percent, 50.0);

        let load = &dash.workload[0];
        assert_eq!(load.open_tasks, 1);
        assert_eq!(load.overdue_tasks, 1);
        assert_eq!(load.open_estimate_hours, 6.0);
    }

    #[test]
    fn portfolio_flags_risk() {
        let row = |status, end: Option<NaiveDate>, overdue| PortfolioRow {
            project_id: Uuid::new_v4(),
            code: "p".into(),
            name: "P".into(),
            organization_name: "Acme".into(),
            status,
            start_date: None,
            end_date: end,
            total_tasks: 4,
            done_tasks: 2,
            cancelled_tasks: 0,
            overdue_tasks: overdue,
            estimate_hours: 0.0,
            member_count: 1,
        };

        let summary = portfolio(
            vec![
                row(ProjectStatus::Active, None, 1),
                row(ProjectStatus::Active, Some(day(1)), 0),
                row(ProjectStatus::Completed, Some(day(1)), 0),
                row(ProjectStatus::Planning, Some(day(30)), 0),
            ],
            day(15),
        );

        assert_eq!(summary.project_count, 4);
        assert_eq!(summary.at_risk_projects, 2);
        assert_eq!(summary.by_status[&ProjectStatus::Active], 2);
        assert_eq!(summary.total_tasks, 16);
        assert_eq!(summary.completion_percent, 50.0);
        assert!(!summary.projects[2].at_risk);
    }
}
