//! Client state owned outside of any single view.
//!
//! SYSTEM CONTEXT
//! ==============
//! `auth` holds the session and its persistence; `tasks` holds the task list
//! a view is currently showing.

pub mod auth;
pub mod tasks;
