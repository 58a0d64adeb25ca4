//! Mock API tests for the bitacora library.
//!
//! These tests use wiremock to simulate the Bitácora backend and exercise
//! login, the refresh-on-401 pipeline and logout end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bitacora::error::AuthError;
use bitacora::{
    AccessToken, ApiUrl, AuthEventKind, Client, ClientConfig, Credentials, Error, ErrorKind,
    RefreshToken, Session, TokenCodec, TokenStore, UserRecord,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a client against a mock server.
fn mock_client(server: &MockServer, store: TokenStore) -> Client {
    // For tests, we need to allow HTTP localhost
    let url = ApiUrl::new(format!("http://127.0.0.1:{}", server.address().port())).unwrap();
    Client::new(ClientConfig::new(url), store).unwrap()
}

/// Record every published event kind, in order.
fn record_events(client: &Client) -> Arc<Mutex<Vec<AuthEventKind>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let _sub = client
        .events()
        .subscribe_all(move |event| s.lock().unwrap().push(event.kind()));
    seen
}

fn count(events: &Mutex<Vec<AuthEventKind>>, kind: AuthEventKind) -> usize {
    events.lock().unwrap().iter().filter(|k| **k == kind).count()
}

/// An unsigned token with the given payload.
fn jwt(payload: Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn logged_in_store(token: &str) -> TokenStore {
    let store = TokenStore::in_memory();
    store.save_session(&Session {
        access_token: AccessToken::new(token),
        refresh_token: Some(RefreshToken::new("r1")),
        user: UserRecord::new(1, "alice", "ADMIN"),
        expiry_epoch_seconds: None,
    });
    store
}

async fn mount_refresh(server: &MockServer, template: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "r1"})))
        .respond_with(template)
        .expect(expected)
        .mount(server)
        .await;
}

// ============================================================================
// Login / Logout
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "t1",
            "refreshToken": "r1",
            "userId": 1,
            "role": "ADMIN",
            "permissions": ["READ_USERS"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = TokenStore::in_memory();
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let user = client
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap();

    assert_eq!(user.id, 1);
    assert_eq!(user.username, "alice");
    assert!(user.has_permission("READ_USERS"));
    assert_eq!(store.get_token().unwrap().as_str(), "t1");
    assert_eq!(store.get_refresh_token().unwrap().as_str(), "r1");
    assert!(store.is_authenticated());
    assert_eq!(*events.lock().unwrap(), vec![AuthEventKind::Login]);
}

#[tokio::test]
async fn test_login_stores_token_expiry() {
    let server = MockServer::start().await;
    let token = jwt(json!({"sub": "alice", "id": 1, "exp": 4_102_444_800_i64}));

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": token,
            "userId": 1,
            "username": "alice",
            "role": "USER"
        })))
        .mount(&server)
        .await;

    let store = TokenStore::in_memory();
    let client = mock_client(&server, store.clone());
    client
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap();

    assert_eq!(store.get_expiration(), Some(4_102_444_800));
    assert!(store.get_refresh_token().is_none());
    assert!(!TokenCodec::is_expired(store.get_token().unwrap().as_str()));
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "UNAUTHORIZED",
            "message": "Invalid username or password"
        })))
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let store = TokenStore::in_memory();
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let err = client
        .login(Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("Invalid username or password"));
    assert!(!store.is_authenticated());
    assert_eq!(*events.lock().unwrap(), vec![AuthEventKind::AuthError]);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    client.logout().await;

    assert!(store.get_token().is_none());
    assert!(store.get_user().is_none());
    assert_eq!(*events.lock().unwrap(), vec![AuthEventKind::Logout]);
}

#[tokio::test]
async fn test_logout_when_server_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    client.logout().await;

    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn test_fetch_current_user() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "username": "alice",
            "role": "ADMIN",
            "permissions": ["READ_USERS", "WRITE_USERS"],
            "fullName": "Alice Example"
        })))
        .mount(&server)
        .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    let user = client.fetch_current_user().await.unwrap();

    assert_eq!(user.full_name.as_deref(), Some("Alice Example"));
    assert_eq!(store.get_user().unwrap(), user);
}

// ============================================================================
// Refresh-on-401
// ============================================================================

#[tokio::test]
async fn test_401_refreshes_and_retries_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/activities"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/activities"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "t2", "refreshToken": "r2"})),
        1,
    )
    .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let activities: Value = client.get("/activities").await.unwrap();

    assert_eq!(activities, json!([{"id": 7}]));
    assert_eq!(store.get_token().unwrap().as_str(), "t2");
    assert_eq!(store.get_refresh_token().unwrap().as_str(), "r2");
    assert_eq!(count(&events, AuthEventKind::TokenRefreshed), 1);
    assert_eq!(count(&events, AuthEventKind::SessionExpired), 0);
}

#[tokio::test]
async fn test_failed_refresh_expires_session_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/activities"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "UNAUTHORIZED",
            "message": "Token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let err = client.get::<Value>("/activities").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(err.to_string().contains("Token expired"));
    assert_eq!(count(&events, AuthEventKind::SessionExpired), 1);
    assert!(store.get_token().is_none());
    assert!(store.get_refresh_token().is_none());
    assert!(store.get_user().is_none());

    let notice = client.notice_for(&err);
    assert_eq!(notice.redirect_after, Some(Duration::from_millis(1500)));
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/activities"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(8)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/activities"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(8)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"token": "t2"}))
            .set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let results = futures_util::future::join_all(
        (0..8).map(|_| client.get::<Value>("/activities")),
    )
    .await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(count(&events, AuthEventKind::TokenRefreshed), 1);
    // Refresh did not rotate, so the original refresh token is kept.
    assert_eq!(store.get_refresh_token().unwrap().as_str(), "r1");
}

#[tokio::test]
async fn test_retry_rejected_abandons_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/activities"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "t2"})),
        1,
    )
    .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let err = client.get::<Value>("/activities").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(count(&events, AuthEventKind::SessionExpired), 1);
    assert!(!store.is_authenticated());
}

#[tokio::test]
async fn test_expired_token_refreshes_before_sending() {
    let server = MockServer::start().await;
    let expired = jwt(json!({"sub": "alice", "id": 1, "exp": 1_000}));
    assert!(TokenCodec::is_expired(&expired));

    Mock::given(method("GET"))
        .and(path("/activities"))
        .and(header("authorization", "Bearer t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/activities"))
        .and(header("authorization", format!("Bearer {expired}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(0)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "t2"})),
        1,
    )
    .await;

    let client = mock_client(&server, logged_in_store(&expired));
    let events = record_events(&client);

    let _: Value = client.get("/activities").await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![AuthEventKind::TokenExpired, AuthEventKind::TokenRefreshed]
    );
}

#[tokio::test]
async fn test_expired_token_with_failing_refresh_is_never_sent() {
    let server = MockServer::start().await;
    let expired = jwt(json!({"sub": "alice", "id": 1, "exp": 1_000}));

    Mock::given(method("GET"))
        .and(path("/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"message": "refresh token revoked"})),
        1,
    )
    .await;

    let store = logged_in_store(&expired);
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let err = client.get::<Value>("/activities").await.unwrap_err();

    assert!(
        matches!(err, Error::Auth(AuthError::SessionExpired)),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            AuthEventKind::TokenExpired,
            AuthEventKind::AuthError,
            AuthEventKind::SessionExpired
        ]
    );
    assert!(store.get_token().is_none());
    assert!(store.get_refresh_token().is_none());
    assert!(store.get_user().is_none());
}

// ============================================================================
// Session validation and manual refresh
// ============================================================================

#[tokio::test]
async fn test_validate_session_without_token() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = mock_client(&server, TokenStore::in_memory());

    assert!(!client.validate_session().await);
}

#[tokio::test]
async fn test_validate_session_with_live_token() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let live = jwt(json!({"sub": "alice", "id": 1, "exp": 4_102_444_800_i64}));
    let client = mock_client(&server, logged_in_store(&live));

    assert!(client.validate_session().await);
}

#[tokio::test]
async fn test_validate_session_refreshes_expired_token() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "t2", "refreshToken": "r2"})),
        1,
    )
    .await;

    let expired = jwt(json!({"sub": "alice", "id": 1, "exp": 1_000}));
    let store = logged_in_store(&expired);
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    assert!(client.validate_session().await);
    assert_eq!(store.get_token().unwrap().as_str(), "t2");
    assert_eq!(store.get_refresh_token().unwrap().as_str(), "r2");
    assert_eq!(count(&events, AuthEventKind::TokenRefreshed), 1);
}

#[tokio::test]
async fn test_validate_session_fails_when_refresh_fails() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let expired = jwt(json!({"sub": "alice", "id": 1, "exp": 1_000}));
    let store = logged_in_store(&expired);
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    assert!(!client.validate_session().await);
    assert!(!store.is_authenticated());
    assert_eq!(count(&events, AuthEventKind::SessionExpired), 1);
}

#[tokio::test]
async fn test_refresh_without_session() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = mock_client(&server, TokenStore::in_memory());

    let err = client.refresh().await.unwrap_err();
    assert!(
        matches!(err, Error::Auth(AuthError::NotAuthenticated)),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_refresh_without_refresh_token() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let store = TokenStore::in_memory();
    store.set_token(&AccessToken::new("t1"));
    let client = mock_client(&server, store.clone());
    let events = record_events(&client);

    let err = client.refresh().await.unwrap_err();
    assert!(
        matches!(err, Error::Auth(AuthError::RefreshTokenMissing)),
        "unexpected error: {err:?}"
    );
    // The access token is left alone.
    assert_eq!(store.get_token().unwrap().as_str(), "t1");
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_success_returns_new_token() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"token": "t2"})),
        1,
    )
    .await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());

    let token = client.refresh().await.unwrap();
    assert_eq!(token.as_str(), "t2");
    assert_eq!(store.get_token().unwrap().as_str(), "t2");
    // Not rotated, so the original refresh token stays.
    assert_eq!(store.get_refresh_token().unwrap().as_str(), "r1");
}

#[tokio::test]
async fn test_refresh_failure_is_session_expired() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());

    let err = client.refresh().await.unwrap_err();
    assert!(
        matches!(err, Error::Auth(AuthError::SessionExpired)),
        "unexpected error: {err:?}"
    );
    assert!(store.get_token().is_none());
}

// ============================================================================
// Errors passed through unchanged
// ============================================================================

#[tokio::test]
async fn test_forbidden_is_not_refreshed() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/users/2"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "FORBIDDEN",
            "message": "Admins only"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let store = logged_in_store("t1");
    let client = mock_client(&server, store.clone());

    let err = client.delete("/users/2").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(store.is_authenticated());
    assert_eq!(client.notice_for(&err).redirect_after, None);
}

#[tokio::test]
async fn test_non_json_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = mock_client(&server, logged_in_store("t1"));

    let err = client
        .post::<_, Value>("/tasks", &json!({"title": "Review"}))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn test_no_content_response() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/tasks/3"))
        .and(header("authorization", "Bearer t1"))
        .and(body_json(json!({"status": "DONE"})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = mock_client(&server, logged_in_store("t1"));
    let body: Option<Value> = client
        .put("/tasks/3", &json!({"status": "DONE"}))
        .await
        .unwrap();

    assert!(body.is_none());
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    // Nothing listens on port 9 (discard) on a test host.
    let url = ApiUrl::new("http://127.0.0.1:9").unwrap();
    let client = Client::new(ClientConfig::new(url), logged_in_store("t1")).unwrap();

    let err = client.get::<Value>("/activities").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(client.is_authenticated());
}
