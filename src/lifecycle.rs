//! What completing a task does, and which tasks are currently actionable.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Status, Task};
use crate::recurrence::{compute_next_occurrence, Occurrence, RepetitionRule};

/// Where a task stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Open and actionable now.
    Active,
    /// Recurring and open, but its current occurrence is still in the future.
    Dormant,
    Completed,
}

impl TaskState {
    pub fn label(self) -> &'static str {
        match self {
            TaskState::Active => "Due",
            TaskState::Dormant => "Upcoming",
            TaskState::Completed => "Done",
        }
    }
}

pub fn state_of(task: &Task, now: DateTime<Utc>) -> TaskState {
    if task.is_completed() {
        TaskState::Completed
    } else if is_actionable(task, now) {
        TaskState::Active
    } else {
        TaskState::Dormant
    }
}

/// Whether the task's current occurrence has arrived.
///
/// Only recurring tasks with a pending anchor are gated; everything else is
/// left to the caller's own completed/open filtering.
pub fn is_actionable(task: &Task, now: DateTime<Utc>) -> bool {
    match (&task.recurrence, task.next_due_at) {
        (Some(_), Some(next)) => next <= now,
        _ => true,
    }
}

/// Instant a recurring task advances from when it is completed.
pub fn basis_of(task: &Task, now: DateTime<Utc>) -> DateTime<Utc> {
    task.next_due_at.or(task.due_date).unwrap_or(now)
}

/// Marks `task` done at `now` and returns the updated task.
///
/// A recurring task whose rule still has occurrences stays open with its
/// anchor moved to the next one. Otherwise the task is completed for good.
/// Completion is terminal: an already completed task is returned unchanged.
pub fn complete_task(task: &Task, now: DateTime<Utc>) -> Task {
    let mut updated = task.clone();
    if task.is_completed() {
        return updated;
    }
    let next = match &task.recurrence {
        Some(rule) => compute_next_occurrence(basis_of(task, now), rule, now),
        None => Occurrence::Exhausted,
    };
    match next {
        Occurrence::Next(at) => {
            debug!(id = task.id, next_due_at = %at, "recurring task advanced");
            updated.next_due_at = Some(at);
            updated.status = Status::Open;
        }
        Occurrence::Exhausted => {
            if task.recurrence.is_some() {
                debug!(id = task.id, "recurrence exhausted");
            }
            updated.next_due_at = None;
            updated.status = Status::Completed { at: Some(now) };
        }
    }
    updated
}

/// Undoes a terminal completion. Returns `None` if the task is not completed.
///
/// A recurring task that was completed because its rule ran out comes back
/// as a one-off task: the spent rule is dropped so the next completion
/// cannot start a new cycle.
pub fn restore_task(task: &Task) -> Option<Task> {
    if !task.is_completed() {
        return None;
    }
    let mut restored = task.clone();
    restored.status = Status::Open;
    if restored.next_due_at.is_none() {
        restored.recurrence = None;
    }
    Some(restored)
}

/// Sets up scheduling for a newly created task: a recurring task's first
/// occurrence is actionable immediately.
pub fn arm(task: &mut Task, now: DateTime<Utc>) {
    if task.recurrence.is_some() && !task.is_completed() {
        task.next_due_at = Some(now);
    }
}

/// Replaces the task's rule wholesale.
pub fn replace_recurrence(task: &mut Task, rule: Option<RepetitionRule>, now: DateTime<Utc>) {
    task.recurrence = rule;
    if task.recurrence.is_none() {
        task.next_due_at = None;
    } else if task.next_due_at.is_none() {
        arm(task, now);
    }
}

/// Splits the open tasks into those due now and those still upcoming.
/// Completed tasks are in neither list.
pub fn partition_due(tasks: &[Task], now: DateTime<Utc>) -> (Vec<&Task>, Vec<&Task>) {
    tasks
        .iter()
        .filter(|t| !t.is_completed())
        .partition(|t| is_actionable(t, now))
}
