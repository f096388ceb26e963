//! Error kinds surfaced by the session manager, route guard and API client.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal. Every variant carries enough context to render an
//! inline message, and `retryable` lets callers decide whether to offer a
//! retry (the client itself never retries).

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::time::Duration;

/// Errors produced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No session, or the session token has expired.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Login or registration was rejected by the server.
    #[error("{0}")]
    AuthenticationFailed(String),

    /// A token could not be split or its payload could not be decoded.
    #[error("token decode failed: {0}")]
    TokenDecode(String),

    /// The request did not complete within the configured window.
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Transport-level failure (connect, reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response; status and body are echoed verbatim.
    #[error("{operation} failed: {status} - {body}")]
    Api { operation: &'static str, status: u16, body: String },

    /// A 2xx response whose body matched neither accepted shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// Input rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    /// Token persistence failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),
}

impl ClientError {
    /// Stable machine-readable code for logs and CLI exit reporting.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "E_AUTH_REQUIRED",
            Self::AuthenticationFailed(_) => "E_AUTH_FAILED",
            Self::TokenDecode(_) => "E_TOKEN_DECODE",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Network(_) => "E_NETWORK",
            Self::Api { .. } => "E_API",
            Self::Decode(_) => "E_DECODE",
            Self::Validation(_) => "E_VALIDATION",
            Self::Storage(_) => "E_STORAGE",
            Self::Config(_) => "E_CONFIG",
        }
    }

    /// Whether repeating the same call might succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Network(_) | Self::Api { status: 429 | 500..=599, .. }
        )
    }

    /// Short message suitable for showing inline to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationRequired => "Please log in to continue.".to_owned(),
            Self::Timeout(_) => "Request timed out. Please try again.".to_owned(),
            Self::Network(_) => "Network error. Please check your connection and try again.".to_owned(),
            other => other.to_string(),
        }
    }
}
