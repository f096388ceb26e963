//! Route guard for protected views.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every protected view runs [`RouteGuard::check`] before rendering and gets
//! the live [`Session`] back on success, so views never reach for global
//! state. Unauthenticated users are sent to [`LOGIN_ROUTE`].
//!
//! STATES
//! ======
//! `Checking` while deciding (including the short wait for a restore that is
//! still in flight), then `Authenticated` or `Unauthenticated`.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::time::Duration;

use tracing::{debug, info};

use crate::state::auth::{AuthState, Session, SessionManager};
use crate::util::storage::TokenStore;
use crate::util::token::is_token_expired;

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    #[default]
    Checking,
    Authenticated,
}

/// What the protected view should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Render with this session.
    Render(Session),
    /// Navigate away to this route.
    Redirect(&'static str),
}

/// Redirect when auth has settled and no session is present.
#[must_use]
pub fn should_redirect_unauth(state: &AuthState) -> bool {
    !state.loading && state.session.is_none()
}

#[derive(Clone, Debug)]
pub struct RouteGuard {
    restore_grace: Duration,
    state: GuardState,
}

impl RouteGuard {
    #[must_use]
    pub fn new(restore_grace: Duration) -> Self {
        Self { restore_grace, state: GuardState::Checking }
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Decide whether the protected view may render.
    ///
    /// Clears an expired or undecodable token from the session manager
    /// before redirecting.
    pub async fn check<S: TokenStore>(&mut self, sessions: &SessionManager<S>) -> GuardOutcome {
        self.state = GuardState::Checking;

        let mut rx = sessions.subscribe();
        let current = rx.borrow_and_update().session.clone();
        let session = match current {
            Some(session) => Some(session),
            None if sessions.has_persisted_token() => {
                debug!(grace_ms = self.restore_grace.as_millis(), "token persisted but not loaded; waiting for restore");
                match tokio::time::timeout(self.restore_grace, rx.wait_for(|s| s.session.is_some())).await {
                    Ok(Ok(state)) => state.session.clone(),
                    _ => None,
                }
            }
            None => None,
        };

        let Some(session) = session else {
            debug!("no session; redirecting to login");
            self.state = GuardState::Unauthenticated;
            return GuardOutcome::Redirect(LOGIN_ROUTE);
        };

        if session.is_expired() || is_token_expired(&session.token) {
            info!(user_id = %session.user_id, "session token expired; redirecting to login");
            sessions.expire();
            self.state = GuardState::Unauthenticated;
            return GuardOutcome::Redirect(LOGIN_ROUTE);
        }

        self.state = GuardState::Authenticated;
        GuardOutcome::Render(session)
    }
}
