//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RESTORE_GRACE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the task service, without a trailing slash.
    pub api_url: String,
    /// Upper bound on each HTTP request, including reading the body.
    pub request_timeout: Duration,
    /// How long the route guard waits for a pending session restore.
    pub restore_grace: Duration,
    /// File backing the persisted token store.
    pub token_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            restore_grace: Duration::from_millis(DEFAULT_RESTORE_GRACE_MS),
            token_file: default_token_file(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables, loading `.env`
    /// first when present.
    ///
    /// Optional:
    /// - `TASKDECK_API_URL`: default `http://127.0.0.1:8000`
    /// - `TASKDECK_REQUEST_TIMEOUT_SECS`: default 10
    /// - `TASKDECK_RESTORE_GRACE_MS`: default 100
    /// - `TASKDECK_TOKEN_FILE`: default `$HOME/.taskdeck/session.json`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when a numeric variable is set but not
    /// a valid number, or when the API URL is not http(s).
    pub fn from_env() -> Result<Self, ClientError> {
        let _ = dotenvy::dotenv();

        let api_url = env_non_empty("TASKDECK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let api_url = normalize_api_url(&api_url)?;
        let request_timeout =
            Duration::from_secs(env_parse_u64("TASKDECK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?);
        let restore_grace = Duration::from_millis(env_parse_u64("TASKDECK_RESTORE_GRACE_MS", DEFAULT_RESTORE_GRACE_MS)?);
        let token_file = env_non_empty("TASKDECK_TOKEN_FILE").map_or_else(default_token_file, PathBuf::from);

        Ok(Self { api_url, request_timeout, restore_grace, token_file })
    }
}

/// Trim trailing slashes and require an http(s) scheme.
///
/// # Errors
///
/// Returns [`ClientError::Config`] for an empty or non-http(s) URL.
pub fn normalize_api_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::Config(format!("TASKDECK_API_URL must be an http(s) URL, got '{raw}'")));
    }
    Ok(trimmed.to_owned())
}

/// Value of `key`, treating unset and blank alike.
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse_u64(key: &str, default: u64) -> Result<u64, ClientError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ClientError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))),
        _ => Ok(default),
    }
}

fn default_token_file() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".taskdeck").join("session.json")
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
