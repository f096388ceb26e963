//! REST client for the task service.
//!
//! Every call is bounded by the configured timeout (send and body read
//! together) and resolves to exactly one of: parsed payload,
//! [`ClientError::Timeout`], [`ClientError::Network`], or
//! [`ClientError::Api`] echoing the status and body. Nothing is retried here.
//!
//! AUTHENTICATION
//! ==============
//! Task endpoints take the session token as a `token` query parameter and the
//! owner id as a path segment. Logout sends it as a bearer header instead.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{AuthResponse, NewTask, Task, TaskBody, TaskFilters, TaskListBody, TaskUpdate, error_detail};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::state::auth::Session;
use crate::util::token::resolve_owner;

/// HTTP client bound to one task service base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl ApiClient {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL does not parse or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::with_base_url(&config.api_url, config.request_timeout)
    }

    /// Build a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the base URL does not parse or the
    /// HTTP client cannot be constructed.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::Config(format!("invalid API URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("API URL '{base_url}' cannot be a base")));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("taskdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("http client build failed: {e}")))?;
        Ok(Self { http, base_url, timeout })
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /api/auth/login` with the credentials as query parameters.
    ///
    /// # Errors
    ///
    /// Any non-2xx response becomes [`ClientError::AuthenticationFailed`]
    /// carrying the server's `detail`, else "Login failed".
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        let request = self
            .http
            .post(url)
            .query(&[("email", email), ("password", password)]);
        let body = self
            .execute("login", request)
            .await
            .map_err(|e| auth_failure(e, "Login failed"))?;
        parse_body(&body)
    }

    /// `POST /api/auth/register` with a JSON body.
    ///
    /// # Errors
    ///
    /// Any non-2xx response becomes [`ClientError::AuthenticationFailed`]
    /// carrying the server's `detail`, else "Registration failed".
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let url = self.endpoint(&["api", "auth", "register"])?;
        let payload = serde_json::json!({ "email": email, "password": password, "name": name });
        let request = self.http.post(url).json(&payload);
        let body = self
            .execute("registration", request)
            .await
            .map_err(|e| auth_failure(e, "Registration failed"))?;
        parse_body(&body)
    }

    /// `POST /api/auth/logout` with the token as a bearer header.
    ///
    /// # Errors
    ///
    /// Returns the usual transport/API errors; callers typically only log them.
    pub async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["api", "auth", "logout"])?;
        let request = self.http.post(url).bearer_auth(token);
        self.execute("logout", request).await.map(|_| ())
    }

    // =========================================================================
    // TASKS
    // =========================================================================

    /// `GET /api/{user_id}/tasks`, sending only the filters that are set.
    ///
    /// # Errors
    ///
    /// [`ClientError::AuthenticationRequired`] for an expired session, plus
    /// the transport/API/decode errors described at module level.
    pub async fn list_tasks(&self, session: &Session, filters: &TaskFilters) -> Result<Vec<Task>, ClientError> {
        let owner = authorize(session)?;
        let request = self
            .task_request(Method::GET, &owner, &[], &session.token)?
            .query(&filters.query_pairs());
        let body = self.execute("fetch tasks", request).await?;
        parse_body::<TaskListBody>(&body).map(TaskListBody::into_tasks)
    }

    /// `GET /api/{user_id}/tasks/{task_id}`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::list_tasks`].
    pub async fn get_task(&self, session: &Session, task_id: &str) -> Result<Task, ClientError> {
        let owner = authorize(session)?;
        let request = self.task_request(Method::GET, &owner, &[task_id], &session.token)?;
        let body = self.execute("fetch task", request).await?;
        parse_body::<TaskBody>(&body).map(TaskBody::into_task)
    }

    /// `POST /api/{user_id}/tasks`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for a blank title, otherwise see
    /// [`ApiClient::list_tasks`].
    pub async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, ClientError> {
        let owner = authorize(session)?;
        if task.title.trim().is_empty() {
            return Err(ClientError::Validation("Title is required".to_owned()));
        }
        let request = self
            .task_request(Method::POST, &owner, &[], &session.token)?
            .json(task);
        let body = self.execute("create task", request).await?;
        parse_body::<TaskBody>(&body).map(TaskBody::into_task)
    }

    /// `PUT /api/{user_id}/tasks/{task_id}`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] when the update would blank the title,
    /// otherwise see [`ApiClient::list_tasks`].
    pub async fn update_task(&self, session: &Session, task_id: &str, update: &TaskUpdate) -> Result<Task, ClientError> {
        let owner = authorize(session)?;
        if update.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(ClientError::Validation("Title is required".to_owned()));
        }
        let request = self
            .task_request(Method::PUT, &owner, &[task_id], &session.token)?
            .json(update);
        let body = self.execute("update task", request).await?;
        parse_body::<TaskBody>(&body).map(TaskBody::into_task)
    }

    /// `PATCH /api/{user_id}/tasks/{task_id}/complete?completed={bool}`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::list_tasks`].
    pub async fn set_completion(&self, session: &Session, task_id: &str, completed: bool) -> Result<Task, ClientError> {
        let owner = authorize(session)?;
        let request = self
            .task_request(Method::PATCH, &owner, &[task_id, "complete"], &session.token)?
            .query(&[("completed", completed)]);
        let body = self.execute("update task completion", request).await?;
        parse_body::<TaskBody>(&body).map(TaskBody::into_task)
    }

    /// `DELETE /api/{user_id}/tasks/{task_id}`. The response body is ignored.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::list_tasks`].
    pub async fn delete_task(&self, session: &Session, task_id: &str) -> Result<(), ClientError> {
        let owner = authorize(session)?;
        let request = self.task_request(Method::DELETE, &owner, &[task_id], &session.token)?;
        self.execute("delete task", request).await?;
        debug!(%task_id, "task deleted");
        Ok(())
    }

    // =========================================================================
    // PLUMBING
    // =========================================================================

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("API URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn task_request(&self, method: Method, owner: &str, rest: &[&str], token: &str) -> Result<RequestBuilder, ClientError> {
        let mut segments = vec!["api", owner, "tasks"];
        segments.extend_from_slice(rest);
        let url = self.endpoint(&segments)?;
        debug!(%method, path = url.path(), "task request");
        Ok(self.http.request(method, url).query(&[("token", token)]))
    }

    /// Send `request` and read its body, all within the timeout window.
    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> Result<String, ClientError> {
        let timeout = self.timeout;
        let exchange = async {
            let response = request.send().await.map_err(|e| transport_error(e, timeout))?;
            let status = response.status();
            let body = response.text().await.map_err(|e| transport_error(e, timeout))?;
            if !status.is_success() {
                return Err(ClientError::Api { operation, status: status.as_u16(), body });
            }
            Ok(body)
        };

        let result = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        };
        if let Err(error) = &result {
            warn!(operation, code = error.error_code(), %error, "request failed");
        }
        result
    }
}

/// Require a live session and pick the owner id for the request path.
fn authorize(session: &Session) -> Result<String, ClientError> {
    if session.token.is_empty() || session.is_expired() {
        return Err(ClientError::AuthenticationRequired);
    }
    resolve_owner(Some(&session.user_id), &session.token)
}

// The URL carries the token as a query parameter, so it is stripped first.
fn transport_error(error: reqwest::Error, timeout: Duration) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout(timeout)
    } else {
        ClientError::Network(error.without_url().to_string())
    }
}

fn auth_failure(error: ClientError, fallback: &str) -> ClientError {
    match error {
        ClientError::Api { body, .. } => {
            ClientError::AuthenticationFailed(error_detail(&body).unwrap_or_else(|| fallback.to_owned()))
        }
        other => other,
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Decode(e.to_string()))
}
