//! # client
//!
//! Client library for the taskdeck task service.
//!
//! This crate holds the session manager, the route guard for protected
//! views, the REST client for task CRUD, and the view-model helpers the
//! `taskdeck` CLI renders from. It has no UI of its own.

pub mod config;
pub mod error;
pub mod net;
pub mod pages;
pub mod state;
pub mod util;

#[cfg(test)]
mod test_helpers;

pub use config::ClientConfig;
pub use error::ClientError;
