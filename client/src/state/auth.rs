//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`SessionManager`] owns the session and is passed explicitly to views and
//! the route guard. State changes are published on a `watch` channel so a
//! guard can wait for an in-flight restore without polling.
//!
//! PERSISTENCE
//! ===========
//! Only the raw token is persisted (under [`TOKEN_KEY`]); everything else is
//! re-derived from its payload on restore.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::types::AuthResponse;
use crate::util::storage::{TOKEN_KEY, TokenStore};
use crate::util::token::{TokenClaims, decode_claims, now_secs};

/// The authenticated identity and token for the current user.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub token: String,
    /// Expiry in seconds since the Unix epoch, when the token carries one.
    pub expiry: Option<i64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl Session {
    /// Rebuild a session purely from a persisted token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TokenDecode`] for a malformed token.
    pub fn from_token(token: &str) -> Result<Self, ClientError> {
        let TokenClaims { sub, email, exp } = decode_claims(token)?;
        let email = email.unwrap_or_default();
        Ok(Self {
            user_id: sub,
            display_name: display_name_from_email(&email),
            email,
            token: token.to_owned(),
            expiry: exp,
        })
    }

    /// Build a session from a login/registration response.
    ///
    /// The response's `user_id` wins; the token's subject fills in when it is
    /// blank. An undecodable token leaves `expiry` unset.
    #[must_use]
    pub fn from_auth_response(response: &AuthResponse, email: &str, display_name: &str) -> Self {
        let claims = decode_claims(&response.token).ok();
        let user_id = if response.user_id.trim().is_empty() {
            claims.as_ref().map(|c| c.sub.clone()).unwrap_or_default()
        } else {
            response.user_id.clone()
        };
        Self {
            user_id,
            email: email.to_owned(),
            display_name: display_name.to_owned(),
            token: response.token.clone(),
            expiry: claims.and_then(|c| c.exp),
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.expiry.is_some_and(|exp| exp < now_secs)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

/// Observable authentication state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<Session>,
    /// A login or registration request is in flight.
    pub loading: bool,
    /// Last user-facing authentication error.
    pub error: Option<String>,
}

impl AuthState {
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }
}

/// Local part of an email address, used as the fallback display name.
#[must_use]
pub fn display_name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_owned()
}

/// Owns the session, its persistence and its observers.
pub struct SessionManager<S: TokenStore> {
    api: ApiClient,
    store: S,
    state: watch::Sender<AuthState>,
}

impl<S: TokenStore> SessionManager<S> {
    pub fn new(api: ApiClient, store: S) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { api, store, state }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receiver that observes every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    /// Whether a token exists in storage, regardless of whether it is loaded.
    pub fn has_persisted_token(&self) -> bool {
        matches!(self.store.get_item(TOKEN_KEY), Ok(Some(token)) if !token.is_empty())
    }

    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// The failure is also recorded as [`AuthState::error`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        self.begin();
        let result = self.api.login(email, password).await;
        self.finish(result, email, &display_name_from_email(email))
    }

    /// Create an account and start a session for it.
    ///
    /// # Errors
    ///
    /// The failure is also recorded as [`AuthState::error`].
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session, ClientError> {
        self.begin();
        let result = self.api.register(name, email, password).await;
        self.finish(result, email, name)
    }

    /// End the session. The server is notified best-effort; local state and
    /// storage are cleared whatever it answers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] only if the token could not be removed.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let token = self.state.borrow().token().map(str::to_owned);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            if let Err(error) = self.api.logout(&token).await {
                warn!(code = error.error_code(), %error, "server logout failed; clearing local session anyway");
            }
        }
        self.state.send_modify(|state| {
            state.session = None;
            state.loading = false;
        });
        info!("logged out");
        self.store.remove_item(TOKEN_KEY)
    }

    /// Reload the session from storage.
    ///
    /// Malformed and expired tokens are removed and reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] when storage cannot be read.
    pub fn restore(&self) -> Result<Option<Session>, ClientError> {
        let Some(token) = self.store.get_item(TOKEN_KEY)?.filter(|t| !t.is_empty()) else {
            debug!("no persisted token");
            return Ok(None);
        };

        let session = match Session::from_token(&token) {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "discarding malformed persisted token");
                self.store.remove_item(TOKEN_KEY)?;
                return Ok(None);
            }
        };
        if session.is_expired() {
            info!(user_id = %session.user_id, "persisted token has expired");
            self.store.remove_item(TOKEN_KEY)?;
            return Ok(None);
        }

        debug!(user_id = %session.user_id, "session restored");
        self.state.send_modify(|state| {
            state.session = Some(session.clone());
            state.error = None;
        });
        Ok(Some(session))
    }

    /// Drop an expired or rejected session from state and storage.
    pub fn expire(&self) {
        self.state.send_modify(|state| state.session = None);
        if let Err(error) = self.store.remove_item(TOKEN_KEY) {
            warn!(%error, "failed to clear expired token");
        }
    }

    #[cfg(test)]
    pub(crate) fn replace_session_for_test(&self, session: Session) {
        self.state.send_modify(|state| state.session = Some(session));
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|state| state.error = None);
    }

    fn begin(&self) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    fn finish(
        &self,
        result: Result<AuthResponse, ClientError>,
        email: &str,
        display_name: &str,
    ) -> Result<Session, ClientError> {
        let outcome = result.and_then(|response| {
            self.store.set_item(TOKEN_KEY, &response.token)?;
            Ok(Session::from_auth_response(&response, email, display_name))
        });

        match outcome {
            Ok(session) => {
                info!(user_id = %session.user_id, "authenticated");
                self.state.send_modify(|state| {
                    state.session = Some(session.clone());
                    state.loading = false;
                    state.error = None;
                });
                Ok(session)
            }
            Err(error) => {
                warn!(code = error.error_code(), "authentication failed");
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(error.user_message());
                });
                Err(error)
            }
        }
    }
}
