//! Kanban board ordering
//!
//! Columns are ordered lists of task ids. A move takes a task out of its
//! column and inserts it into the target column at an index; positions in
//! both columns are renumbered `0..n`.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::db::Task;
use crate::models::TaskStatus;

/// New place of a task after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KanbanError {
    #[error("task {0} is not on the board")]
    UnknownTask(Uuid),
}

/// One board column with its tasks in position order.
#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

/// Move `task` to `target` at `index` (clamped to the column length).
///
/// `columns` must hold at least the task's current column and the target
/// column. Returns a placement for every task whose status or position
/// changed, the moved task included.
pub fn move_task(
    columns: &HashMap<TaskStatus, Vec<Uuid>>,
    task: Uuid,
    target: TaskStatus,
    index: usize,
) -> Result<Vec<Placement>, KanbanError> {
    let source = columns
        .iter()
        .find(|(_, ids)| ids.contains(&task))
        .map(|(status, _)| *status)
        .ok_or(KanbanError::UnknownTask(task))?;

    let mut before: HashMap<Uuid, (TaskStatus, i64)> = HashMap::new();
    for status in [source, target] {
        for (pos, id) in columns.get(&status).into_iter().flatten().enumerate() {
            before.insert(*id, (status, pos as i64));
        }
    }

    let mut source_ids: Vec<Uuid> = columns[&source].iter().copied().filter(|id| *id != task).collect();
    let mut after: Vec<(TaskStatus, Vec<Uuid>)> = Vec::with_capacity(2);

    if source == target {
        let at = index.min(source_ids.len());
        source_ids.insert(at, task);
        after.push((source, source_ids));
    } else {
        let mut target_ids = columns.get(&target).cloned().unwrap_or_default();
        let at = index.min(target_ids.len());
        target_ids.insert(at, task);
        after.push((source, source_ids));
        after.push((target, target_ids));
    }

    let placements = after
        .into_iter()
        .flat_map(|(status, ids)| {
            ids.into_iter().enumerate().map(move |(pos, task_id)| Placement {
                task_id,
                status,
                position: pos as i64,
            })
        })
        .filter(|p| before.get(&p.task_id) != Some(&(p.status, p.position)))
        .collect();

    Ok(placements)
}

/// Group tasks into board columns in status order, each sorted by position.
pub fn columns(tasks: Vec<Task>) -> Vec<BoardColumn> {
    let mut by_status: HashMap<TaskStatus, Vec<Task>> = HashMap::new();
    for task in tasks {
        by_status.entry(task.status).or_default().push(task);
    }

    TaskStatus::ALL
        .iter()
        .map(|status| {
            let mut tasks = by_status.remove(status).unwrap_or_default();
            tasks.sort_by_key(|t| t.position);
            BoardColumn {
                status: *status,
                tasks,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    /// Apply placements to the column map, the way the repository does.
    fn apply(columns: &mut HashMap<TaskStatus, Vec<Uuid>>, placements: &[Placement]) {
        let moved: Vec<Uuid> = placements.iter().map(|p| p.task_id).collect();
        for ids in columns.values_mut() {
            ids.retain(|id| !moved.contains(id));
        }
        let mut sorted = placements.to_vec();
        sorted.sort_by_key(|p| p.position);
        for p in sorted {
            let col = columns.entry(p.status).or_default();
            let at = (p.position as usize).min(col.len());
            col.insert(at, p.task_id);
        }
    }

    #[test]
    fn reorder_within_column() {
        let todo = ids(4);
        let columns = HashMap::from([(TaskStatus::Todo, todo.clone())]);

        let placements = move_task(&columns, todo[3], TaskStatus::Todo, 1).unwrap();

        let mut result = columns.clone();
        apply(&mut result, &placements);
        assert_eq!(result[&TaskStatus::Todo], vec![todo[0], todo[3], todo[1], todo[2]]);
        // todo[0] kept its slot
        assert!(placements.iter().all(|p| p.task_id != todo[0]));
    }

    #[test]
    fn move_across_columns_keeps_both_dense() {
        let todo = ids(3);
        let doing = ids(2);
        let columns = HashMap::from([
            (TaskStatus::Todo, todo.clone()),
            (TaskStatus::InProgress, doing.clone()),
        ]);

        let placements = move_task(&columns, todo[0], TaskStatus::InProgress, 1).unwrap();

        let moved = placements.iter().find(|p| p.task_id == todo[0]).unwrap();
        assert_eq!(moved.status, TaskStatus::InProgress);
        assert_eq!(moved.position, 1);

        let mut result = columns.clone();
        apply(&mut result, &placements);
        assert_eq!(result[&TaskStatus::Todo], vec![todo[1], todo[2]]);
        assert_eq!(result[&TaskStatus::InProgress], vec![doing[0], todo[0], doing[1]]);
    }

    #[test]
    fn index_clamps_to_column_end() {
        let todo = ids(2);
        let done = ids(1);
        let columns = HashMap::from([(TaskStatus::Todo, todo.clone()), (TaskStatus::Done, done.clone())]);

        let placements = move_task(&columns, todo[0], TaskStatus::Done, 99).unwrap();
        let moved = placements.iter().find(|p| p.task_id == todo[0]).unwrap();
        assert_eq!(moved.position, 1);
    }

    #[test]
    fn move_into_empty_column() {
        let todo = ids(1);
        let columns = HashMap::from([(TaskStatus::Todo, todo.clone())]);

        let placements = move_task(&columns, todo[0], TaskStatus::InReview, 0).unwrap();
        assert_eq!(
            placements,
            vec![Placement {
                task_id: todo[0],
                status: TaskStatus::InReview,
                position: 0
            }]
        );
    }

    #[test]
    fn unknown_task_is_rejected() {
        let columns = HashMap::from([(TaskStatus::Todo, ids(2))]);
        let stray = Uuid::new_v4();
        assert_eq!(
            move_task(&columns, stray, TaskStatus::Todo, 0),
            Err(KanbanError::UnknownTask(stray))
        );
    }

    #[test]
    fn no_op_move_changes_nothing() {
        let todo = ids(3);
        let columns = HashMap::from([(TaskStatus::Todo, todo.clone())]);
        assert!(move_task(&columns, todo[1], TaskStatus::Todo, 1).unwrap().is_empty());
    }
}
