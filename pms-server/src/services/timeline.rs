//! Gantt projection of a project's phases and tasks

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::graph::{schedule_conflicts, ScheduleConflict};
use crate::db::{Phase, Task};
use crate::models::{PhaseStatus, TaskStatus};

#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub project_id: Uuid,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub phases: Vec<TimelinePhase>,
    /// Dated tasks without a phase
    pub unphased: Vec<TimelineBar>,
    /// Tasks with neither a start nor a due date
    pub unscheduled: Vec<UnscheduledTask>,
    pub dependencies: Vec<DependencyEdge>,
    pub conflicts: Vec<ScheduleConflict>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinePhase {
    pub id: Uuid,
    pub name: String,
    pub status: PhaseStatus,
    /// Phase dates, or the span of its tasks when the phase has none
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub tasks: Vec<TimelineBar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineBar {
    pub task_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub assignee_id: Option<Uuid>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration_days: i64,
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnscheduledTask {
    pub task_id: Uuid,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEdge {
    pub task_id: Uuid,
    pub depends_on_id: Uuid,
}

/// A task with only one date becomes a one-day bar on that date.
fn bar(task: &Task, today: NaiveDate) -> Option<TimelineBar> {
    let (start, end) = match (task.start_date, task.due_date) {
        (Some(start), Some(due)) => (start, due),
        (Some(day), None) | (None, Some(day)) => (day, day),
        (None, None) => return None,
    };

    Some(TimelineBar {
        task_id: task.id,
        title: task.title.clone(),
        status: task.status,
        assignee_id: task.assignee_id,
        start,
        end,
        duration_days: (end - start).num_days() + 1,
        overdue: !task.status.is_closed() && task.due_date.is_some_and(|due| due < today),
    })
}

/// Earliest and latest date over `(start, end)` pairs.
fn span(
    dates: impl Iterator<Item = (Option<NaiveDate>, Option<NaiveDate>)>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    dates.fold((None, None), |(lo, hi), (start, end)| {
        let lo = match (lo, start.or(end)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let hi = match (hi, end.or(start)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        (lo, hi)
    })
}

pub fn build(
    project_id: Uuid,
    phases: &[Phase],
    tasks: &[Task],
    edges: &[(Uuid, Uuid)],
    today: NaiveDate,
) -> Timeline {
    let mut timeline_phases: Vec<TimelinePhase> = phases
        .iter()
        .map(|p| TimelinePhase {
            id: p.id,
            name: p.name.clone(),
            status: p.status,
            start: p.start_date,
            end: p.end_date,
            tasks: Vec::new(),
        })
        .collect();

    let mut unphased = Vec::new();
    let mut unscheduled = Vec::new();

    for task in tasks {
        let Some(task_bar) = bar(task, today) else {
            unscheduled.push(UnscheduledTask {
                task_id: task.id,
                title: task.title.clone(),
                status: task.status,
            });
            continue;
        };

        match task
            .phase_id
            .and_then(|id| timeline_phases.iter_mut().find(|p| p.id == id))
        {
            Some(phase) => phase.tasks.push(task_bar),
            None => unphased.push(task_bar),
        }
    }

    for phase in &mut timeline_phases {
        phase.tasks.sort_by_key(|b| (b.start, b.end));
        if phase.start.is_none() || phase.end.is_none() {
            let (lo, hi) = span(phase.tasks.iter().map(|b| (Some(b.start), Some(b.end))));
            phase.start = phase.start.or(lo);
            phase.end = phase.end.or(hi);
        }
    }
    unphased.sort_by_key(|b| (b.start, b.end));

    let (start, end) = span(
        timeline_phases
            .iter()
            .map(|p| (p.start, p.end))
            .chain(unphased.iter().map(|b| (Some(b.start), Some(b.end)))),
    );

    Timeline {
        project_id,
        start,
        end,
        phases: timeline_phases,
        unphased,
        unscheduled,
        dependencies: edges
            .iter()
            .map(|(task_id, depends_on_id)| DependencyEdge {
                task_id: *task_id,
                depends_on_id: *depends_on_id,
            })
            .collect(),
        conflicts: schedule_conflicts(tasks, edges),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::Priority;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn task(title: &str, start: Option<NaiveDate>, due: Option<NaiveDate>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            phase_id: None,
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            assignee_id: None,
            start_date: start,
            due_date: due,
            estimate_hours: None,
            position: 0,
            created_by: Uuid::nil(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn phase(name: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Phase {
        let now = Utc::now();
        Phase {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            name: name.into(),
            description: None,
            status: PhaseStatus::NotStarted,
            start_date: start,
            end_date: end,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn bars_and_unscheduled() {
        let tasks = vec![
            task("ranged", Some(day(2)), Some(day(4))),
            task("due only", None, Some(day(9))),
            task("floating", None, None),
        ];

        let t = build(Uuid::nil(), &[], &tasks, &[], day(5));

        assert_eq!(t.unphased.len(), 2);
        assert_eq!(t.unphased[0].duration_days, 3);
        assert_eq!(t.unphased[1].start, day(9));
        assert_eq!(t.unphased[1].duration_days, 1);
        assert_eq!(t.unscheduled.len(), 1);
        assert_eq!((t.start, t.end), (Some(day(2)), Some(day(9))));
        assert!(t.unphased[0].overdue);
        assert!(!t.unphased[1].overdue);
    }

    #[test]
    fn phase_span_falls_back_to_tasks() {
        let build_phase = phase("Build", None, None);
        let fixed = phase("Launch", Some(day(20)), Some(day(25)));

        let mut a = task("a", Some(day(3)), Some(day(6)));
        a.phase_id = Some(build_phase.id);
        let mut b = task("b", Some(day(5)), Some(day(12)));
        b.phase_id = Some(build_phase.id);

        let t = build(Uuid::nil(), &[build_phase, fixed], &[a, b], &[], day(1));

        assert_eq!(t.phases[0].start, Some(day(3)));
        assert_eq!(t.phases[0].end, Some(day(12)));
        assert_eq!(t.phases[0].tasks.len(), 2);
        assert_eq!((t.start, t.end), (Some(day(3)), Some(day(25))));
    }

    #[test]
    fn conflicting_dependency_is_reported() {
        let design = task("design", Some(day(1)), Some(day(10)));
        let build_early = task("build", Some(day(5)), Some(day(15)));
        let edges = [(build_early.id, design.id)];

        let t = build(Uuid::nil(), &[], &[design.clone(), build_early.clone()], &edges, day(1));

        assert_eq!(t.dependencies.len(), 1);
        assert_eq!(
            t.conflicts,
            vec![ScheduleConflict {
                task_id: build_early.id,
                depends_on_id: design.id
            }]
        );
    }
}
