//! Task dependency graph
//!
//! An edge `(task, depends_on)` means `task` cannot start before
//! `depends_on` is finished. Graphs are small (one project), so every check
//! walks the full edge list held in memory.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::db::Task;

/// Path of task ids from `from` to `to` following depends-on edges, if any.
pub fn dependency_path(edges: &[(Uuid, Uuid)], from: Uuid, to: Uuid) -> Option<Vec<Uuid>> {
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (task, depends_on) in edges {
        adjacency.entry(*task).or_default().push(*depends_on);
    }

    let mut visited = HashSet::new();
    let mut parent: HashMap<Uuid, Uuid> = HashMap::new();
    let mut stack = vec![from];

    while let Some(node) = stack.pop() {
        if node == to {
            let mut path = vec![to];
            let mut cursor = to;
            while let Some(prev) = parent.get(&cursor) {
                path.push(*prev);
                cursor = *prev;
            }
            path.reverse();
            return Some(path);
        }

        if !visited.insert(node) {
            continue;
        }

        for next in adjacency.get(&node).into_iter().flatten() {
            if !visited.contains(next) {
                parent.entry(*next).or_insert(node);
                stack.push(*next);
            }
        }
    }

    None
}

/// Would adding `task -> depends_on` close a cycle?
///
/// Returns the cycle as a path starting and ending at `task`.
pub fn would_create_cycle(edges: &[(Uuid, Uuid)], task: Uuid, depends_on: Uuid) -> Option<Vec<Uuid>> {
    if task == depends_on {
        return Some(vec![task, task]);
    }

    dependency_path(edges, depends_on, task).map(|path| {
        let mut cycle = Vec::with_capacity(path.len() + 1);
        cycle.push(task);
        cycle.extend(path);
        cycle
    })
}

/// A dependency whose dependent task is scheduled to start before its
/// prerequisite is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleConflict {
    pub task_id: Uuid,
    pub depends_on_id: Uuid,
}

pub fn schedule_conflicts(tasks: &[Task], edges: &[(Uuid, Uuid)]) -> Vec<ScheduleConflict> {
    let by_id: HashMap<Uuid, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

    edges
        .iter()
        .filter_map(|(task_id, depends_on_id)| {
            let task = by_id.get(task_id)?;
            let prerequisite = by_id.get(depends_on_id)?;
            let starts = task.start_date?;
            let due = prerequisite.due_date?;
            (starts < due).then(|| ScheduleConflict {
                task_id: *task_id,
                depends_on_id: *depends_on_id,
            })
        })
        .collect()
}
