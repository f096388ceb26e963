//! Login and registration form handling.
//!
//! SYSTEM CONTEXT
//! ==============
//! The only unprotected screens. Inputs are checked here before the session
//! manager is asked to authenticate, so obviously bad input never reaches
//! the service.

#[cfg(test)]
#[path = "login_test.rs"]
mod login_test;

use crate::state::auth::Session;

/// Trimmed, non-empty registration fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Trim the email and require both fields.
///
/// # Errors
///
/// Returns the message to show under the form.
pub fn validate_login_input(email: &str, password: &str) -> Result<(String, String), &'static str> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err("Enter both email and password.");
    }
    Ok((email.to_owned(), password.to_owned()))
}

/// Trim name and email, and require every field.
///
/// # Errors
///
/// Returns the message to show under the form.
pub fn validate_register_input(name: &str, email: &str, password: &str) -> Result<RegisterInput, &'static str> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() {
        return Err("Enter your name.");
    }
    if !looks_like_email(email) {
        return Err("Enter a valid email address.");
    }
    if password.is_empty() {
        return Err("Enter a password.");
    }
    Ok(RegisterInput { name: name.to_owned(), email: email.to_owned(), password: password.to_owned() })
}

fn looks_like_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
}

#[must_use]
pub fn welcome_line(session: &Session) -> String {
    format!("Welcome, {}!", session.display_name)
}
