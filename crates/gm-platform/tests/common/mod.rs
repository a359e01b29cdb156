//! Shared fixtures: a seeded in-memory platform, a capturing email sender
//! and a small JSON request helper.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use gm_platform::auth::email::{EmailMessage, EmailSender};
use gm_platform::auth::password_service::Argon2Config;
use gm_platform::db::connect_in_memory;
use gm_platform::Platform;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "Admin123!";
pub const PASSWORD: &str = "Str0ng!Pass";

/// Keeps every message instead of sending it
#[derive(Clone, Default)]
pub struct CapturingEmailSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl CapturingEmailSender {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Token from the "Reset token: ..." line of the latest message.
    pub fn last_reset_token(&self) -> Option<String> {
        self.messages().last().and_then(|m| {
            m.body
                .lines()
                .find_map(|line| line.strip_prefix("Reset token: "))
                .map(|t| t.trim().to_string())
        })
    }
}

#[async_trait]
impl EmailSender for CapturingEmailSender {
    async fn send(&self, message: EmailMessage) -> gm_platform::Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub fn test_config() -> gm_config::AppConfig {
    let mut config = gm_config::AppConfig::default();
    config.jwt.secret_key = "integration-test-secret-key-0123456789abcdef".to_string();
    config.email.frontend_base_url = "https://app.example.test".to_string();
    config
}

pub struct TestApp {
    pub platform: Platform,
    pub router: Router,
    pub email: CapturingEmailSender,
}

/// Seeded platform: system roles, built-in permissions and the admin user.
pub async fn spawn() -> TestApp {
    let pool = connect_in_memory().await.unwrap();
    let email = CapturingEmailSender::default();
    let platform = Platform::new(pool, &test_config(), Arc::new(email.clone()), Argon2Config::testing());
    platform.seeder().seed().await.unwrap();
    let router = platform.router();
    TestApp { platform, router, email }
}

impl TestApp {
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.dispatch(request).await
    }

    /// Send a body verbatim, for payloads that are not valid JSON.
    pub async fn send_raw(&self, method: Method, uri: &str, token: Option<&str>, content_type: &str, body: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.dispatch(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn login(&self, user: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "userNameOrEmail": user, "password": password })),
        )
        .await
    }

    pub async fn admin_token(&self) -> String {
        let (status, body) = self.login(ADMIN_USER, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Create a user through the API; returns its id.
    pub async fn create_user(&self, token: &str, user_name: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/users",
                Some(token),
                Some(serde_json::json!({
                    "userName": user_name,
                    "email": format!("{}@plant.example", user_name),
                    "password": PASSWORD,
                    "confirmPassword": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create user failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }
}
