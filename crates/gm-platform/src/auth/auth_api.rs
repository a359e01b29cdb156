//! Auth API Endpoints
//!
//! - POST /auth/login - Password sign-in, returns a token pair
//! - POST /auth/register - Self-service sign-up
//! - POST /auth/refresh - Rotate a refresh token
//! - POST /auth/revoke - Revoke a refresh token (logout)
//! - POST /auth/forgot-password - Email a password reset token
//! - POST /auth/reset-password - Set a new password with a reset token

use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::authentication_service::AuthenticationService;
use super::dto::{AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest};
use crate::shared::api_common::SuccessResponse;
use crate::shared::error::{ErrorResponse, PlatformError};
use crate::shared::extract::Json;
use crate::shared::middleware::ClientInfo;

#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthenticationService>,
}

/// Sign in with user name or email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    operation_id = "postApiAuthLogin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AuthState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, PlatformError> {
    Ok(Json(state.service.login(req, &client).await?))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    operation_id = "postApiAuthRegister",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered and signed in", body = AuthResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "User name or email already in use", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AuthState>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), PlatformError> {
    let response = state.service.register(req, &client).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/refresh",
    tag = "auth",
    operation_id = "postApiAuthRefresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = AuthResponse),
        (status = 401, description = "Invalid, expired or revoked token", body = ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AuthState>,
    client: ClientInfo,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, PlatformError> {
    Ok(Json(state.service.refresh(&req.refresh_token, &client).await?))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/revoke",
    tag = "auth",
    operation_id = "postApiAuthRevoke",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Token revoked"),
        (status = 400, description = "Token already inactive", body = ErrorResponse),
        (status = 404, description = "Unknown token", body = ErrorResponse)
    )
)]
pub async fn revoke(
    State(state): State<AuthState>,
    client: ClientInfo,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<StatusCode, PlatformError> {
    state.service.revoke(&req.refresh_token, &client).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request a password reset email
///
/// Responds with success whether or not the email belongs to an account.
#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = "auth",
    operation_id = "postApiAuthForgotPassword",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request accepted", body = SuccessResponse),
        (status = 400, description = "Validation error", body = ErrorResponse)
    )
)]
pub async fn forgot_password(
    State(state): State<AuthState>,
    client: ClientInfo,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.service.forgot_password(req, &client).await?;
    Ok(Json(SuccessResponse::with_message(
        "If the email belongs to an account, a reset link has been sent",
    )))
}

/// Reset a password with a reset token
#[utoipa::path(
    post,
    path = "/reset-password",
    tag = "auth",
    operation_id = "postApiAuthResetPassword",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = SuccessResponse),
        (status = 400, description = "Invalid token or password", body = ErrorResponse)
    )
)]
pub async fn reset_password(
    State(state): State<AuthState>,
    client: ClientInfo,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.service.reset_password(req, &client).await?;
    Ok(Json(SuccessResponse::with_message("Password has been reset")))
}

pub fn auth_router(state: AuthState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(register))
        .routes(routes!(refresh))
        .routes(routes!(revoke))
        .routes(routes!(forgot_password))
        .routes(routes!(reset_password))
        .with_state(state)
}
