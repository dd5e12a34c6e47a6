//! API Client Tests
//!
//! HTTP behaviour against a mock backend:
//! - Bearer token attachment and the rejection signal
//! - Login error mapping and response layouts
//! - Retries on server errors
//! - Full session round trip over HTTP

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use freespeek_admin::admin::DashboardStats;
use freespeek_admin::{
    extract_credentials, ApiClient, AuthBackend, Config, Error, MemoryTokenStore, SessionManager,
};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(Config::new(server.uri()).with_retry(3, Duration::from_millis(10))).unwrap()
}

fn token() -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::default(),
        &json!({ "sub": "u1", "exp": exp }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_bearer_token_is_attached_and_cleared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/dashboard/stats"))
        .and(header("authorization", "Bearer abc.def.ghi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "totalUsers": 3 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/dashboard/stats"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "No token" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_auth_token("abc.def.ghi");
    let stats: DashboardStats = client.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_users, 3);

    client.clear_auth_token();
    let err = client.dashboard_stats().await.unwrap_err();
    assert!(err.is_session_rejection());

    let received = server.received_requests().await.unwrap();
    let unauthenticated: Vec<&Request> = received
        .iter()
        .filter(|r| !r.headers.contains_key("authorization"))
        .collect();
    assert_eq!(unauthenticated.len(), 1);
}

#[tokio::test]
async fn test_401_with_token_broadcasts_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users/online"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut rejections = client.subscribe_rejections();

    // Without a token a 401 is not a session rejection.
    assert!(client.online_user_count().await.is_err());
    assert!(rejections.try_recv().is_err());

    client.set_auth_token("abc.def.ghi");
    let err = client.online_user_count().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(ref m) if m == "jwt expired"));
    assert_eq!(rejections.try_recv().unwrap(), "abc.def.ghi");
}

#[tokio::test]
async fn test_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/tracking/stats"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/tracking/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "pageViews": 12 } })))
        .mount(&server)
        .await;

    let stats = client_for(&server).tracking_stats().await.unwrap();

    assert_eq!(stats.page_views, 12);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "User not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_auth_token("abc.def.ghi");
    let err = client.get_user("missing").await.unwrap_err();

    assert!(matches!(err, Error::NotFound(ref m) if m == "User not found"));
}

#[tokio::test]
async fn test_login_posts_credentials_without_token() {
    let server = MockServer::start().await;
    let token = token();
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "a@b.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": token, "user": { "_id": "u1", "email": "a@b.com" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_auth_token("stale.token.value");
    let response = AuthBackend::login(&client, "a@b.com", "pw").await.unwrap();
    let credentials = extract_credentials(&response, "a@b.com").unwrap();

    assert_eq!(credentials.token, token);
    assert_eq!(credentials.user.id, "u1");

    let received = server.received_requests().await.unwrap();
    assert!(!received[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_login_rejection_uses_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "success": false, "message": "Wrong password" })))
        .mount(&server)
        .await;

    let err = AuthBackend::login(&client_for(&server), "a@b.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(ref m) if m == "Wrong password"));
}

#[tokio::test]
async fn test_login_rejection_without_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let err = AuthBackend::login(&client_for(&server), "a@b.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");
}

#[tokio::test]
async fn test_current_user_layouts() {
    let layouts = vec![
        json!({ "user": { "id": "u1", "email": "a@b.com" } }),
        json!({ "success": true, "data": { "id": "u1", "email": "a@b.com" } }),
        json!({ "success": true, "data": { "user": { "_id": "u1", "email": "a@b.com" } } }),
        json!({ "id": "u1", "email": "a@b.com" }),
    ];

    for layout in layouts {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(layout.clone()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_auth_token("abc.def.ghi");
        let user = client.get_current_user().await.unwrap();

        assert_eq!(user.id, "u1", "{}", layout);
        assert_eq!(user.email, "a@b.com", "{}", layout);
    }
}

#[tokio::test]
async fn test_session_over_http() {
    let server = MockServer::start().await;
    let token = token();
    let bearer = format!("Bearer {}", token);

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": { "id": "u1", "email": "a@b.com" } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/dashboard/stats"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Token revoked" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryTokenStore::new());
    let session = Arc::new(SessionManager::new(Arc::new(client.clone()), store.clone()));
    let _listener = session.spawn_rejection_listener(client.subscribe_rejections());

    session.login("a@b.com", "pw").await.unwrap();
    assert!(client.has_auth_token());
    assert_eq!(store.peek(), Some(token.clone()));

    // A restart with the same storage restores the session.
    let restarted = SessionManager::new(Arc::new(client_for(&server)), store.clone());
    assert!(restarted.initialize().await.is_authenticated());

    // The backend revokes the token: the next data call signs the console out.
    assert!(client.dashboard_stats().await.is_err());
    let mut status = session.subscribe();
    let signed_out = tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| !s.is_authenticated()))
        .await
        .map(|changed| changed.is_ok());

    assert_eq!(signed_out, Ok(true));
    assert!(!client.has_auth_token());
    assert_eq!(store.peek(), None);
}

#[tokio::test]
async fn test_late_401_for_previous_token_keeps_new_session() {
    let server = MockServer::start().await;
    let token = token();
    Mock::given(method("GET"))
        .and(path("/api/admin/dashboard/stats"))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({ "message": "jwt expired" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let store = Arc::new(MemoryTokenStore::new());
    let session = Arc::new(SessionManager::new(Arc::new(client.clone()), store.clone()));
    let _listener = session.spawn_rejection_listener(client.subscribe_rejections());

    client.set_auth_token("old-token");
    let slow = tokio::spawn({
        let client = client.clone();
        async move { client.dashboard_stats().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.login("a@b.com", "pw").await.unwrap();
    assert!(slow.await.unwrap().is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(session.is_authenticated());
    assert!(client.has_auth_token());
    assert_eq!(store.peek(), Some(token));
}

#[tokio::test]
async fn test_logout_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_auth_token("abc.def.ghi");
    AuthBackend::logout(&client).await.unwrap();
}
