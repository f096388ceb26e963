//! Test fixtures: token minting and an in-process fake task service.
//!
//! The fake binds an ephemeral localhost port and speaks the same routes and
//! JSON shapes as the real service, so tests exercise the real HTTP client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::net::api::ApiClient;
use crate::state::auth::Session;
use crate::util::token::{decode_claims, now_secs};

const FIXED_TIMESTAMP: &str = "2025-01-01T00:00:00";

// =============================================================================
// TOKENS
// =============================================================================

pub fn make_token_from_json(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

pub fn make_token(sub: &str, email: Option<&str>, exp: Option<i64>) -> String {
    let mut payload = Map::new();
    payload.insert("sub".into(), json!(sub));
    if let Some(email) = email {
        payload.insert("email".into(), json!(email));
    }
    if let Some(exp) = exp {
        payload.insert("exp".into(), json!(exp));
    }
    make_token_from_json(&Value::Object(payload))
}

pub fn fresh_token(sub: &str, email: &str) -> String {
    make_token(sub, Some(email), Some(now_secs() + 1800))
}

pub fn expired_token(sub: &str, email: &str) -> String {
    make_token(sub, Some(email), Some(now_secs() - 60))
}

pub fn session_for(user_id: &str, email: &str) -> Session {
    Session::from_token(&fresh_token(user_id, email)).expect("fresh token decodes")
}

// =============================================================================
// FAKE SERVICE
// =============================================================================

pub struct FakeUser {
    pub id: String,
    pub password: String,
}

#[derive(Default)]
pub struct FakeState {
    /// Keyed by email.
    pub users: HashMap<String, FakeUser>,
    pub tasks: Vec<Value>,
    /// Raw query string of every request, in arrival order.
    pub queries: Vec<String>,
    pub logout_authorizations: Vec<String>,
    pub delay: Option<Duration>,
    pub wrap_responses: bool,
}

type Shared = Arc<Mutex<FakeState>>;

#[derive(Clone)]
pub struct FakeService {
    pub state: Shared,
    pub addr: SocketAddr,
}

impl FakeService {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("fake service should bind");
        let addr = listener.local_addr().expect("fake service addr");
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { state, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> ApiClient {
        self.client_with_timeout(Duration::from_secs(5))
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> ApiClient {
        ApiClient::with_base_url(&self.base_url(), timeout).expect("client should build")
    }

    pub fn add_user(&self, email: &str, password: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.lock()
            .users
            .insert(email.to_owned(), FakeUser { id: id.clone(), password: password.to_owned() });
        id
    }

    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn set_wrap_responses(&self, wrap: bool) {
        self.lock().wrap_responses = wrap;
    }

    pub fn last_query(&self) -> Option<String> {
        self.lock().queries.last().cloned()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.lock()
            .tasks
            .iter()
            .filter_map(|t| t["id"].as_str().map(str::to_owned))
            .collect()
    }

    pub fn logout_authorizations(&self) -> Vec<String> {
        self.lock().logout_authorizations.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state mutex should lock")
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/logout", post(logout))
        .route("/api/{user_id}/tasks", get(list_tasks).post(create_task))
        .route("/api/{user_id}/tasks/{task_id}", get(get_task).put(update_task).delete(delete_task))
        .route("/api/{user_id}/tasks/{task_id}/complete", patch(toggle_task))
        .with_state(state)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn pause(state: &Shared) {
    let delay = state.lock().expect("fake state mutex should lock").delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn record_query(state: &Shared, raw: Option<String>) {
    state
        .lock()
        .expect("fake state mutex should lock")
        .queries
        .push(raw.unwrap_or_default());
}

fn respond_task(state: &Shared, task: Value) -> Response {
    let wrap = state.lock().expect("fake state mutex should lock").wrap_responses;
    if wrap { Json(json!({ "task": task })).into_response() } else { Json(task).into_response() }
}

#[derive(Deserialize)]
struct TaskQuery {
    token: Option<String>,
    completed: Option<bool>,
    priority: Option<String>,
}

fn authorize(user_id: &str, token: Option<&str>) -> Result<(), Response> {
    let Some(token) = token else {
        return Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "token query parameter required"));
    };
    let claims =
        decode_claims(token).map_err(|_| detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))?;
    if claims.is_expired() {
        return Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"));
    }
    if claims.sub != user_id {
        return Err(detail(StatusCode::FORBIDDEN, "Not authorized to access these tasks"));
    }
    Ok(())
}

#[derive(Deserialize)]
struct LoginQuery {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Query(q): Query<LoginQuery>) -> Response {
    pause(&state).await;
    let guard = state.lock().expect("fake state mutex should lock");
    match guard.users.get(&q.email) {
        Some(user) if user.password == q.password => Json(json!({
            "user_id": user.id,
            "token": fresh_token(&user.id, &q.email),
            "message": "Login successful",
        }))
        .into_response(),
        _ => detail(StatusCode::UNAUTHORIZED, "Incorrect email or password"),
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    pause(&state).await;
    let (Some(email), Some(password), Some(_name)) =
        (body["email"].as_str(), body["password"].as_str(), body["name"].as_str())
    else {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": [{ "msg": "field required" }] })))
            .into_response();
    };
    let mut guard = state.lock().expect("fake state mutex should lock");
    if guard.users.contains_key(email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let id = uuid::Uuid::new_v4().to_string();
    guard
        .users
        .insert(email.to_owned(), FakeUser { id: id.clone(), password: password.to_owned() });
    Json(json!({ "user_id": id, "token": fresh_token(&id, email), "message": "User registered successfully" }))
        .into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    state
        .lock()
        .expect("fake state mutex should lock")
        .logout_authorizations
        .push(auth);
    Json(json!({ "message": "Logout successful" })).into_response()
}

async fn list_tasks(
    State(state): State<Shared>,
    Path(user_id): Path<String>,
    RawQuery(raw): RawQuery,
    Query(q): Query<TaskQuery>,
) -> Response {
    record_query(&state, raw);
    pause(&state).await;
    if let Err(resp) = authorize(&user_id, q.token.as_deref()) {
        return resp;
    }
    let guard = state.lock().expect("fake state mutex should lock");
    let tasks: Vec<Value> = guard
        .tasks
        .iter()
        .filter(|t| t["user_id"] == user_id.as_str())
        .filter(|t| q.completed.is_none_or(|c| t["completed"] == c))
        .filter(|t| q.priority.as_deref().is_none_or(|p| t["priority"] == p))
        .cloned()
        .collect();
    if guard.wrap_responses {
        Json(json!({ "tasks": tasks })).into_response()
    } else {
        Json(tasks).into_response()
    }
}

async fn create_task(
    State(state): State<Shared>,
    Path(user_id): Path<String>,
    RawQuery(raw): RawQuery,
    Query(q): Query<TaskQuery>,
    Json(body): Json<Value>,
) -> Response {
    record_query(&state, raw);
    pause(&state).await;
    if let Err(resp) = authorize(&user_id, q.token.as_deref()) {
        return resp;
    }
    let Some(title) = body["title"].as_str() else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "title required");
    };
    let task = json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "user_id": user_id,
        "title": title,
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "completed": false,
        "priority": body["priority"].as_str().unwrap_or("medium"),
        "due_date": body.get("due_date").cloned().unwrap_or(Value::Null),
        "created_at": FIXED_TIMESTAMP,
        "updated_at": FIXED_TIMESTAMP,
    });
    state
        .lock()
        .expect("fake state mutex should lock")
        .tasks
        .push(task.clone());
    respond_task(&state, task)
}

async fn get_task(
    State(state): State<Shared>,
    Path((user_id, task_id)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
    Query(q): Query<TaskQuery>,
) -> Response {
    record_query(&state, raw);
    pause(&state).await;
    if let Err(resp) = authorize(&user_id, q.token.as_deref()) {
        return resp;
    }
    let found = state
        .lock()
        .expect("fake state mutex should lock")
        .tasks
        .iter()
        .find(|t| t["id"] == task_id.as_str() && t["user_id"] == user_id.as_str())
        .cloned();
    match found {
        Some(task) => respond_task(&state, task),
        None => detail(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn update_task(
    State(state): State<Shared>,
    Path((user_id, task_id)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
    Query(q): Query<TaskQuery>,
    Json(body): Json<Value>,
) -> Response {
    record_query(&state, raw);
    pause(&state).await;
    if let Err(resp) = authorize(&user_id, q.token.as_deref()) {
        return resp;
    }
    let updated = {
        let mut guard = state.lock().expect("fake state mutex should lock");
        guard
            .tasks
            .iter_mut()
            .find(|t| t["id"] == task_id.as_str() && t["user_id"] == user_id.as_str())
            .map(|task| {
                if let Some(fields) = body.as_object() {
                    for (key, value) in fields {
                        task[key.as_str()] = value.clone();
                    }
                }
                task["updated_at"] = json!("2025-01-02T00:00:00");
                task.clone()
            })
    };
    match updated {
        Some(task) => respond_task(&state, task),
        None => detail(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn toggle_task(
    State(state): State<Shared>,
    Path((user_id, task_id)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
    Query(q): Query<TaskQuery>,
) -> Response {
    record_query(&state, raw);
    pause(&state).await;
    if let Err(resp) = authorize(&user_id, q.token.as_deref()) {
        return resp;
    }
    let Some(completed) = q.completed else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "completed query parameter required");
    };
    let updated = {
        let mut guard = state.lock().expect("fake state mutex should lock");
        guard
            .tasks
            .iter_mut()
            .find(|t| t["id"] == task_id.as_str() && t["user_id"] == user_id.as_str())
            .map(|task| {
                task["completed"] = json!(completed);
                task.clone()
            })
    };
    match updated {
        Some(task) => respond_task(&state, task),
        None => detail(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn delete_task(
    State(state): State<Shared>,
    Path((user_id, task_id)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
    Query(q): Query<TaskQuery>,
) -> Response {
    record_query(&state, raw);
    pause(&state).await;
    if let Err(resp) = authorize(&user_id, q.token.as_deref()) {
        return resp;
    }
    let mut guard = state.lock().expect("fake state mutex should lock");
    let before = guard.tasks.len();
    guard
        .tasks
        .retain(|t| !(t["id"] == task_id.as_str() && t["user_id"] == user_id.as_str()));
    if guard.tasks.len() == before {
        return detail(StatusCode::NOT_FOUND, "Task not found");
    }
    Json(json!({ "message": "Task deleted successfully" })).into_response()
}
