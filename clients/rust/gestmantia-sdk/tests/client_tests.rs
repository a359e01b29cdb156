//! Client tests against a mocked API
//!
//! Tests for:
//! - Sign-in stores the token pair and authorizes later calls
//! - One refresh and replay on 401
//! - Rejected refresh clears the session
//! - Error bodies map to typed errors

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gestmantia_sdk::models::CreateUserRequest;
use gestmantia_sdk::{Client, Config, Error, InMemoryTokenStore, TokenPair, TokenStore};

fn user_json(id: &str, user_name: &str) -> Value {
    json!({
        "id": id,
        "userName": user_name,
        "email": format!("{}@plant.example", user_name),
        "emailConfirmed": true,
        "firstName": null,
        "lastName": null,
        "fullName": user_name,
        "phoneNumber": null,
        "profilePictureUrl": null,
        "isActive": true,
        "isLockedOut": false,
        "lockoutEnd": null,
        "lockReason": null,
        "accessFailedCount": 0,
        "lastLoginDate": null,
        "createdAt": "2026-01-05T08:00:00Z",
        "updatedAt": null,
        "roles": ["User"]
    })
}

fn session_json(access: &str, refresh: &str) -> Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "tokenType": "Bearer",
        "expiresIn": 900,
        "expiresAt": (Utc::now() + Duration::minutes(15)).to_rfc3339(),
        "user": user_json("0HZX1", "mjones")
    })
}

async fn client_with(server: &MockServer, access: &str, refresh: &str) -> (Client, Arc<InMemoryTokenStore>) {
    let store = Arc::new(InMemoryTokenStore::new());
    store
        .set(TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_at: Utc::now() + Duration::minutes(15),
        })
        .await;
    let client = Client::with_token_store(Config::new(server.uri()), store.clone()).unwrap();
    (client, store)
}

#[tokio::test]
async fn test_login_stores_tokens_and_sends_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"userNameOrEmail": "mjones", "password": "Str0ng!Pass"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/account/me"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("0HZX1", "mjones")))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(Config::new(server.uri())).unwrap();
    let session = client.login("mjones", "Str0ng!Pass").await.unwrap();
    assert_eq!(session.user.user_name, "mjones");

    let stored = client.token_store().get().await.unwrap();
    assert_eq!(stored.refresh_token, "refresh-1");

    let me = client.me().await.unwrap();
    assert_eq!(me.roles, vec!["User".to_string()]);
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_once_and_replayed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users/0HZX1"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "TOKEN_EXPIRED",
            "message": "Token has expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("fresh", "refresh-2")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/users/0HZX1"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("0HZX1", "mjones")))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_with(&server, "stale", "refresh-1").await;
    let user = client.users().get("0HZX1").await.unwrap();
    assert_eq!(user.id, "0HZX1");

    let rotated = store.get().await.unwrap();
    assert_eq!(rotated.access_token, "fresh");
    assert_eq!(rotated.refresh_token, "refresh-2");
}

#[tokio::test]
async fn test_rejected_refresh_clears_session_and_surfaces_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/roles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "UNAUTHORIZED",
            "message": "Authentication required"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "INVALID_TOKEN",
            "message": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_with(&server, "stale", "reused").await;
    let err = client.roles().list(None).await.unwrap_err();

    assert!(err.is_unauthorized(), "got {:?}", err);
    assert!(store.get().await.is_none());
}

#[tokio::test]
async fn test_anonymous_401_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/account/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("never", "never")))
        .expect(0)
        .mount(&server)
        .await;

    let client = Client::new(Config::new(server.uri())).unwrap();
    assert!(matches!(client.me().await, Err(Error::Authentication(_))));
}

#[tokio::test]
async fn test_create_user_conflict_keeps_error_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "DUPLICATE_EMAIL",
            "message": "Email 'mjones@plant.example' is already in use"
        })))
        .mount(&server)
        .await;

    let (client, _) = client_with(&server, "access-1", "refresh-1").await;
    let err = client
        .users()
        .create(&CreateUserRequest {
            user_name: "mjones".to_string(),
            email: "mjones@plant.example".to_string(),
            password: "Str0ng!Pass".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    match err {
        Error::Conflict { code, .. } => assert_eq!(code, "DUPLICATE_EMAIL"),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_users_sends_paging_and_role_name_is_path_encoded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("page", "2"))
        .and(query_param("size", "5"))
        .and(query_param("search", "jones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [user_json("0HZX1", "mjones")],
            "page": 2,
            "size": 5,
            "total": 11,
            "totalPages": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/users/0HZX1/roles/Shift%20Lead"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_with(&server, "access-1", "refresh-1").await;
    let page = client.users().list(2, 5, Some("jones")).await.unwrap();
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.data.len(), 1);

    client.users().remove_role("0HZX1", "Shift Lead").await.unwrap();
}

#[tokio::test]
async fn test_logout_revokes_and_clears_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/revoke"))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store) = client_with(&server, "access-1", "refresh-1").await;
    client.logout().await.unwrap();
    assert!(store.get().await.is_none());

    // nothing left to revoke
    client.logout().await.unwrap();
}
