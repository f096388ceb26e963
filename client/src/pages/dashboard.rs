//! Dashboard screen: welcome, recent tasks and counts.
//!
//! SYSTEM CONTEXT
//! ==============
//! This is the authenticated landing route. The binary fetches the task list
//! once through the guard-approved session and renders it here.

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod dashboard_test;

use std::fmt::Write as _;

use chrono::NaiveDateTime;

use super::login::welcome_line;
use super::tasks::task_line;
use crate::state::auth::Session;
use crate::state::tasks::{RECENT_TASK_LIMIT, TasksState};

pub fn render_dashboard(session: &Session, tasks: &TasksState, now: NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", welcome_line(session));
    if !session.email.is_empty() {
        let _ = writeln!(out, "Email: {}", session.email);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Your Tasks");

    if let Some(error) = &tasks.error {
        let _ = write!(out, "  {error}");
        return out;
    }

    let recent = tasks.recent(RECENT_TASK_LIMIT);
    if recent.is_empty() {
        let _ = write!(out, "  No tasks found. Create your first task with `taskdeck tasks add`.");
        return out;
    }
    for task in recent {
        let _ = writeln!(out, "  {}", task_line(task));
    }

    let summary = tasks.summary(now);
    let _ = write!(
        out,
        "\n{} total, {} completed, {} pending, {} high priority, {} overdue",
        summary.total, summary.completed, summary.pending, summary.high_priority, summary.overdue
    );
    out
}
