//! Task-list state for the dashboard and task views.
//!
//! DESIGN
//! ======
//! The list is replaced wholesale on every refresh; single-task responses
//! patch it in place so a view can skip the refetch after a mutation.

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tasks_test;

use chrono::NaiveDateTime;

use crate::net::types::{Priority, Task};

/// Number of tasks shown on the dashboard.
pub const RECENT_TASK_LIMIT: usize = 5;

/// Tasks currently shown by a view.
#[derive(Clone, Debug, Default)]
pub struct TasksState {
    pub items: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Counts shown alongside a task list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TaskSummary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high_priority: usize,
    /// Incomplete tasks whose due date has passed.
    pub overdue: usize,
}

impl TasksState {
    /// Swap in a fresh list from the service and clear any previous error.
    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.items = tasks;
        self.loading = false;
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// Insert or overwrite one task by id. New tasks go to the front.
    pub fn upsert(&mut self, task: Task) {
        match self.items.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.items.insert(0, task),
        }
    }

    /// Drop a task by id. Returns whether it was present.
    pub fn remove(&mut self, task_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|t| t.id != task_id);
        self.items.len() != before
    }

    #[must_use]
    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.items.iter().find(|t| t.id == task_id)
    }

    /// The `limit` most recently created tasks, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.items.iter().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        tasks
    }

    #[must_use]
    pub fn summary(&self, now: NaiveDateTime) -> TaskSummary {
        let completed = self.items.iter().filter(|t| t.completed).count();
        TaskSummary {
            total: self.items.len(),
            completed,
            pending: self.items.len() - completed,
            high_priority: self.items.iter().filter(|t| t.priority == Priority::High).count(),
            overdue: self.items.iter().filter(|t| is_overdue(t, now)).count(),
        }
    }
}

#[must_use]
pub fn is_overdue(task: &Task, now: NaiveDateTime) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < now)
}
