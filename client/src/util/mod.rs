//! Utility helpers shared across state and page modules.
//!
//! SYSTEM CONTEXT
//! ==============
//! Utility modules isolate token handling, persistence and route guarding
//! from page logic to improve reuse and testability.

pub mod auth;
pub mod storage;
pub mod token;
