//! API Middleware
//!
//! Bearer-token authentication for Axum and client information extraction.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, header::USER_AGENT, request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::auth::token_service::{extract_bearer_token, TokenService};
use crate::shared::authorization::{AuthContext, AuthorizationService};
use crate::shared::error::{ErrorResponse, FieldMessages, PlatformError};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub token_service: Arc<TokenService>,
    pub authz_service: Arc<AuthorizationService>,
}

/// Authenticated user extractor
/// Validates the bearer JWT and builds the AuthContext
pub struct Authenticated(pub AuthContext);

impl std::ops::Deref for Authenticated {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error response for authentication failures
pub struct AuthError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AuthError {
    fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code.to_string(),
            message: self.message,
            details: FieldMessages::new(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by AuthLayer
        let app_state = parts.extensions.get::<AppState>().cloned().ok_or_else(|| AuthError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: "Auth service not configured".to_string(),
        })?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| AuthError::unauthorized("UNAUTHORIZED", "Missing authentication token"))?;

        let claims = app_state.token_service.validate_token(token).map_err(|e| match e {
            PlatformError::TokenExpired => AuthError::unauthorized("TOKEN_EXPIRED", "Token expired"),
            other => {
                debug!(error = %other, "Rejected access token");
                AuthError::unauthorized("INVALID_TOKEN", "Invalid token")
            }
        })?;

        let context = app_state
            .authz_service
            .build_context(&claims)
            .await
            .map_err(|e| match e {
                PlatformError::Unauthorized { message } => AuthError::unauthorized("UNAUTHORIZED", message),
                other => {
                    error!(error = %other, "Failed to resolve authorization context");
                    AuthError {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        code: "INTERNAL_ERROR",
                        message: "An internal error occurred".to_string(),
                    }
                }
            })?;

        Ok(Authenticated(context))
    }
}

/// Caller address and user agent, recorded on security events
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn ip(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    fn from_parts(parts: &Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        // First hop of X-Forwarded-For, then X-Real-IP, then the socket peer
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| header("x-real-ip").map(String::from))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip_address, user_agent }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_parts(parts))
    }
}

/// Middleware layer that injects AppState into request extensions
/// This enables the Authenticated extractor to work
#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<Request<B>> for AuthMiddleware<S>
where
    S: Service<Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        req.extensions_mut().insert(self.state.clone());
        let future = self.inner.call(req);
        Box::pin(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let p = parts(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .header("x-real-ip", "10.0.0.2")
                .header("user-agent", "curl/8.0"),
        );
        let info = ClientInfo::from_parts(&p);
        assert_eq!(info.ip(), Some("203.0.113.7"));
        assert_eq!(info.agent(), Some("curl/8.0"));
    }

    #[test]
    fn test_client_info_falls_back_to_connect_info() {
        let mut p = parts(Request::builder());
        p.extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(ClientInfo::from_parts(&p).ip(), Some("127.0.0.1"));
        assert_eq!(ClientInfo::from_parts(&parts(Request::builder())).ip(), None);
    }
}
