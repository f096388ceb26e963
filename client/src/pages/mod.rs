//! Page modules for route-level screens.
//!
//! ARCHITECTURE
//! ============
//! Each page exposes input validation and text rendering for its screen.
//! Orchestration (guard, requests, output) lives in the binary.

pub mod dashboard;
pub mod login;
pub mod tasks;
