//! Task list, detail and form handling.
//!
//! SYSTEM CONTEXT
//! ==============
//! Turns raw form and filter input into typed requests, and typed tasks back
//! into text. Title rules match the service so a blank title is rejected
//! before any request is sent.

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tasks_test;

use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::net::types::{NewTask, Priority, SortField, SortOrder, Task, TaskFilters, TaskUpdate, parse_timestamp};

pub const TITLE_REQUIRED: &str = "Title is required";

/// Raw task form fields, as typed by the user.
#[derive(Clone, Debug, Default)]
pub struct TaskForm<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub due_date: Option<&'a str>,
}

/// Raw list filter fields. Empty strings and `all` mean "not supplied".
#[derive(Clone, Debug, Default)]
pub struct FilterForm<'a> {
    pub completed: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub sort: Option<&'a str>,
    pub order: Option<&'a str>,
}

/// Build a create request. Only the title is required.
///
/// # Errors
///
/// Returns a user-facing message for a blank title or unparseable field.
pub fn build_new_task(form: &TaskForm<'_>) -> Result<NewTask, String> {
    let title = form.title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(TITLE_REQUIRED.to_owned());
    }
    Ok(NewTask {
        title: title.to_owned(),
        description: non_blank(form.description),
        priority: form.priority.map(str::parse::<Priority>).transpose()?.unwrap_or_default(),
        due_date: parse_due_date(form.due_date)?,
    })
}

/// Build an update carrying only the supplied fields.
///
/// # Errors
///
/// Returns a user-facing message for a blank title, an unparseable field,
/// or when nothing would change.
pub fn build_update(form: &TaskForm<'_>) -> Result<TaskUpdate, String> {
    let title = match form.title.map(str::trim) {
        Some("") => return Err(TITLE_REQUIRED.to_owned()),
        other => other.map(str::to_owned),
    };
    let update = TaskUpdate {
        title,
        description: form.description.map(|d| d.trim().to_owned()),
        completed: None,
        priority: form.priority.map(str::parse::<Priority>).transpose()?,
        due_date: parse_due_date(form.due_date)?,
    };
    if update.is_empty() {
        return Err("Nothing to update".to_owned());
    }
    Ok(update)
}

/// Parse an optional due date; blank means none.
///
/// # Errors
///
/// Returns a message naming the rejected value.
pub fn parse_due_date(raw: Option<&str>) -> Result<Option<NaiveDateTime>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| format!("invalid due date '{raw}' (expected YYYY-MM-DD or an ISO-8601 timestamp)")),
    }
}

/// Turn filter input into typed filters, dropping anything not supplied.
///
/// # Errors
///
/// Returns a message naming the rejected value.
pub fn parse_filters(form: &FilterForm<'_>) -> Result<TaskFilters, String> {
    let completed = match supplied(form.completed).map(str::to_ascii_lowercase).as_deref() {
        None => None,
        Some("true" | "completed" | "done") => Some(true),
        Some("false" | "pending" | "open") => Some(false),
        Some(other) => return Err(format!("unknown status '{other}' (expected completed, pending or all)")),
    };
    Ok(TaskFilters {
        completed,
        priority: supplied(form.priority).map(str::parse::<Priority>).transpose()?,
        sort: supplied(form.sort).map(str::parse::<SortField>).transpose()?,
        order: supplied(form.order).map(str::parse::<SortOrder>).transpose()?,
    })
}

fn supplied(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}

// =============================================================================
// RENDERING
// =============================================================================

#[must_use]
pub fn status_label(completed: bool) -> &'static str {
    if completed { "Completed" } else { "Pending" }
}

/// One-line summary: checkbox, title, priority, optional due date and id.
#[must_use]
pub fn task_line(task: &Task) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{check} {} ({}", task.title, task.priority);
    if let Some(due) = task.due_date {
        let _ = write!(line, ", due {}", due.format("%Y-%m-%d"));
    }
    let _ = write!(line, ")  {}", task.id);
    line
}

#[must_use]
pub fn render_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_owned();
    }
    tasks.iter().map(task_line).collect::<Vec<_>>().join("\n")
}

#[must_use]
pub fn render_task_detail(task: &Task) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", task.title);
    let _ = writeln!(out, "  id:          {}", task.id);
    let _ = writeln!(out, "  status:      {}", status_label(task.completed));
    let _ = writeln!(out, "  priority:    {}", task.priority);
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "  description: {description}");
    }
    if let Some(due) = task.due_date {
        let _ = writeln!(out, "  due:         {}", due.format("%Y-%m-%d"));
    }
    let _ = writeln!(out, "  created:     {}", task.created_at.format("%Y-%m-%d %H:%M"));
    let _ = write!(out, "  updated:     {}", task.updated_at.format("%Y-%m-%d %H:%M"));
    out
}
