use super::*;
use crate::net::types::{Priority, SortField, SortOrder};
use crate::test_helpers::{FakeService, expired_token, fresh_token, session_for};

async fn service_with_session() -> (FakeService, Session) {
    let service = FakeService::spawn().await;
    let user_id = service.add_user("alice@example.com", "pw");
    let session = session_for(&user_id, "alice@example.com");
    (service, session)
}

fn query_keys(raw: &str) -> Vec<String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split('=').next().unwrap_or_default().to_owned())
        .collect()
}

// =============================================================
// construction
// =============================================================

#[test]
fn with_base_url_rejects_garbage() {
    assert!(matches!(ApiClient::with_base_url("not a url", Duration::from_secs(1)), Err(ClientError::Config(_))));
}

#[test]
fn endpoint_appends_segments_to_base_path() {
    let client = ApiClient::with_base_url("http://example.com/prefix/", Duration::from_secs(1)).unwrap();
    let url = client.endpoint(&["api", "u-1", "tasks"]).unwrap();
    assert_eq!(url.as_str(), "http://example.com/prefix/api/u-1/tasks");
}

#[test]
fn new_uses_configured_timeout() {
    let config = ClientConfig { request_timeout: Duration::from_secs(3), ..ClientConfig::default() };
    assert_eq!(ApiClient::new(&config).unwrap().timeout(), Duration::from_secs(3));
}

// =============================================================
// auth endpoints
// =============================================================

#[tokio::test]
async fn login_sends_credentials_and_returns_token() {
    let service = FakeService::spawn().await;
    let user_id = service.add_user("bob@example.com", "s3cret");
    let response = service.client().login("bob@example.com", "s3cret").await.unwrap();
    assert_eq!(response.user_id, user_id);
    assert_eq!(response.message, "Login successful");
    assert_eq!(crate::util::token::decode_claims(&response.token).unwrap().sub, user_id);
}

#[tokio::test]
async fn login_rejection_is_authentication_failed() {
    let service = FakeService::spawn().await;
    let err = service.client().login("nobody@example.com", "x").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationFailed(ref m) if m == "Incorrect email or password"));
}

#[tokio::test]
async fn register_validation_list_is_flattened() {
    let service = FakeService::spawn().await;
    let client = service.client();
    let url = client.endpoint(&["api", "auth", "register"]).unwrap();
    let request = client.http.post(url).json(&serde_json::json!({ "email": "x@y.z" }));
    let err = client
        .execute("registration", request)
        .await
        .map_err(|e| auth_failure(e, "Registration failed"))
        .unwrap_err();
    assert_eq!(err.to_string(), "field required");
}

// =============================================================
// task operations
// =============================================================

#[tokio::test]
async fn create_with_only_title_defaults_to_medium_and_incomplete() {
    let (service, session) = service_with_session().await;
    let task = service
        .client()
        .create_task(&session, &NewTask::titled("Water plants"))
        .await
        .unwrap();
    assert_eq!(task.title, "Water plants");
    assert_eq!(task.priority, Priority::Medium);
    assert!(!task.completed);
    assert_eq!(task.user_id, session.user_id);
}

#[tokio::test]
async fn create_rejects_blank_title_without_request() {
    let (service, session) = service_with_session().await;
    let err = service
        .client()
        .create_task(&session, &NewTask::titled("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(service.last_query().is_none());
}

#[tokio::test]
async fn delete_then_list_never_returns_deleted_id() {
    let (service, session) = service_with_session().await;
    let client = service.client();
    let keep = client.create_task(&session, &NewTask::titled("keep")).await.unwrap();
    let gone = client.create_task(&session, &NewTask::titled("gone")).await.unwrap();

    client.delete_task(&session, &gone.id).await.unwrap();

    let ids: Vec<String> = client
        .list_tasks(&session, &TaskFilters::default())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![keep.id]);
    assert!(!ids.contains(&gone.id));
    assert!(!service.task_ids().contains(&gone.id));
}

#[tokio::test]
async fn delete_missing_task_echoes_status_and_body() {
    let (service, session) = service_with_session().await;
    let err = service.client().delete_task(&session, "missing").await.unwrap_err();
    let ClientError::Api { status, body, .. } = err else {
        panic!("expected api error, got {err:?}");
    };
    assert_eq!(status, 404);
    assert!(body.contains("Task not found"));
}

#[tokio::test]
async fn list_omits_unsupplied_filters() {
    let (service, session) = service_with_session().await;
    let client = service.client();

    client.list_tasks(&session, &TaskFilters::default()).await.unwrap();
    assert_eq!(query_keys(&service.last_query().unwrap()), vec!["token"]);

    let filters = TaskFilters { completed: Some(false), order: Some(SortOrder::Asc), ..TaskFilters::default() };
    client.list_tasks(&session, &filters).await.unwrap();
    let raw = service.last_query().unwrap();
    assert_eq!(query_keys(&raw), vec!["token", "completed", "order"]);
    assert!(!raw.contains("priority="));
    assert!(!raw.contains("sort="));
}

#[tokio::test]
async fn list_applies_server_side_filters() {
    let (service, session) = service_with_session().await;
    let client = service.client();
    let high = NewTask { priority: Priority::High, ..NewTask::titled("urgent") };
    client.create_task(&session, &high).await.unwrap();
    client.create_task(&session, &NewTask::titled("later")).await.unwrap();

    let filters = TaskFilters { priority: Some(Priority::High), sort: Some(SortField::Title), ..TaskFilters::default() };
    let tasks = client.list_tasks(&session, &filters).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "urgent");
}

#[tokio::test]
async fn wrapped_responses_are_accepted() {
    let (service, session) = service_with_session().await;
    service.set_wrap_responses(true);
    let client = service.client();
    let created = client.create_task(&session, &NewTask::titled("wrapped")).await.unwrap();
    let fetched = client.get_task(&session, &created.id).await.unwrap();
    let listed = client.list_tasks(&session, &TaskFilters::default()).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let (service, session) = service_with_session().await;
    let client = service.client();
    let created = client.create_task(&session, &NewTask::titled("draft")).await.unwrap();

    let update = TaskUpdate { title: Some("final".into()), ..TaskUpdate::default() };
    let updated = client.update_task(&session, &created.id, &update).await.unwrap();
    assert_eq!(updated.title, "final");
    assert_eq!(updated.priority, created.priority);
    assert_eq!(updated.completed, created.completed);
}

#[tokio::test]
async fn set_completion_sends_flag_in_query() {
    let (service, session) = service_with_session().await;
    let client = service.client();
    let created = client.create_task(&session, &NewTask::titled("toggle me")).await.unwrap();

    let done = client.set_completion(&session, &created.id, true).await.unwrap();
    assert!(done.completed);
    assert!(service.last_query().unwrap().contains("completed=true"));

    let reopened = client.set_completion(&session, &created.id, false).await.unwrap();
    assert!(!reopened.completed);
}

#[tokio::test]
async fn owner_falls_back_to_token_subject_when_session_id_blank() {
    let (service, mut session) = service_with_session().await;
    let owner = session.user_id.clone();
    session.user_id = String::new();
    let task = service
        .client()
        .create_task(&session, &NewTask::titled("fallback"))
        .await
        .unwrap();
    assert_eq!(task.user_id, owner);
}

#[tokio::test]
async fn mismatched_owner_is_forbidden_api_error() {
    let (service, mut session) = service_with_session().await;
    session.user_id = "someone-else".into();
    let err = service
        .client()
        .list_tasks(&session, &TaskFilters::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));
}

// =============================================================
// session preconditions and failure kinds
// =============================================================

#[tokio::test]
async fn expired_session_is_rejected_before_any_request() {
    let (service, session) = service_with_session().await;
    let expired = Session::from_token(&expired_token(&session.user_id, &session.email)).unwrap();
    let err = service
        .client()
        .list_tasks(&expired, &TaskFilters::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationRequired));
    assert!(service.last_query().is_none());
}

#[tokio::test]
async fn slow_response_surfaces_timeout_not_network() {
    let (service, session) = service_with_session().await;
    service.set_delay(Duration::from_millis(500));
    let client = service.client_with_timeout(Duration::from_millis(50));

    let err = client.list_tasks(&session, &TaskFilters::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(50)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_surfaces_network_error() {
    let client = ApiClient::with_base_url("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
    let session = Session::from_token(&fresh_token("u-1", "a@b.c")).unwrap();
    let err = client.list_tasks(&session, &TaskFilters::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
    assert!(!err.to_string().contains(&session.token));
}

#[tokio::test]
async fn logout_sends_bearer_header() {
    let service = FakeService::spawn().await;
    service.client().logout("tok-123").await.unwrap();
    assert_eq!(service.logout_authorizations(), vec!["Bearer tok-123".to_owned()]);
}
