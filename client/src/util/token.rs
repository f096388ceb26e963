//! Session token decoding.
//!
//! SYSTEM CONTEXT
//! ==============
//! Tokens are `header.payload.signature`. The client never verifies the
//! signature; it only reads the payload to learn the subject, email and
//! expiry. Every caller that needs those fields goes through [`decode_claims`].

#[cfg(test)]
#[path = "token_test.rs"]
mod token_test;

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Claims carried in the token payload segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the owning user's identifier.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiry as seconds since the Unix epoch. Absent means no expiry.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// True when `exp` is set and strictly earlier than `now_secs`.
    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.exp.is_some_and(|exp| exp < now_secs)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

/// Decode the payload segment of `token` into typed claims.
///
/// Accepts base64url with or without padding, plus the standard alphabet.
///
/// # Errors
///
/// Returns [`ClientError::TokenDecode`] when the token does not have three
/// segments, the payload is not base64, or the JSON lacks a `sub`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClientError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClientError::TokenDecode("expected three dot-separated segments".to_owned()));
    };

    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| ClientError::TokenDecode(format!("payload is not base64: {e}")))?;
    let claims: TokenClaims =
        serde_json::from_slice(&bytes).map_err(|e| ClientError::TokenDecode(format!("payload is not valid claims: {e}")))?;

    if claims.sub.trim().is_empty() || claims.sub == "undefined" {
        return Err(ClientError::TokenDecode("payload has no subject".to_owned()));
    }
    Ok(claims)
}

/// True when `token` cannot be decoded or its expiry has passed.
#[must_use]
pub fn is_token_expired(token: &str) -> bool {
    decode_claims(token).map_or(true, |claims| claims.is_expired())
}

/// Pick the owner id for a task request: the explicit id when usable,
/// otherwise the token's subject.
///
/// # Errors
///
/// Propagates [`decode_claims`] failures when falling back to the token.
pub fn resolve_owner(explicit: Option<&str>, token: &str) -> Result<String, ClientError> {
    if let Some(id) = explicit.map(str::trim).filter(|id| is_usable_id(id)) {
        return Ok(id.to_owned());
    }
    decode_claims(token).map(|claims| claims.sub)
}

fn is_usable_id(id: &str) -> bool {
    !id.is_empty() && id != "undefined" && id != "null"
}

/// Current wall-clock time as seconds since the Unix epoch.
#[must_use]
pub fn now_secs() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}
