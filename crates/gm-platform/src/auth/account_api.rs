//! Account API
//!
//! The signed-in user's own profile and password.

use std::sync::Arc;

use axum::extract::State;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::account_service::AccountService;
use super::dto::{ChangePasswordRequest, UpdateProfileRequest};
use crate::shared::api_common::SuccessResponse;
use crate::shared::authorization::{policies, PolicyMap};
use crate::shared::error::PlatformError;
use crate::shared::extract::Json;
use crate::shared::middleware::{Authenticated, ClientInfo};
use crate::user::dto::UserResponse;

#[derive(Clone)]
pub struct AccountState {
    pub service: Arc<AccountService>,
    pub policies: Arc<PolicyMap>,
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/me",
    tag = "account",
    operation_id = "getApiAccountMe",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(state): State<AccountState>,
    auth: Authenticated,
) -> Result<Json<UserResponse>, PlatformError> {
    state.policies.require(policies::AUTHENTICATED, &auth)?;
    Ok(Json(state.service.get_profile(&auth.user_id).await?))
}

/// Update the current user's profile
#[utoipa::path(
    put,
    path = "/me",
    tag = "account",
    operation_id = "putApiAccountMe",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<AccountState>,
    auth: Authenticated,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, PlatformError> {
    state.policies.require(policies::AUTHENTICATED, &auth)?;
    Ok(Json(state.service.update_profile(&auth.user_id, req).await?))
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/change-password",
    tag = "account",
    operation_id = "postApiAccountChangePassword",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = SuccessResponse),
        (status = 400, description = "Wrong current password or policy violation")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AccountState>,
    auth: Authenticated,
    client: ClientInfo,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, PlatformError> {
    state.policies.require(policies::AUTHENTICATED, &auth)?;
    state.service.change_password(&auth.user_id, req, &client).await?;
    Ok(Json(SuccessResponse::with_message("Password changed")))
}

pub fn account_router(state: AccountState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(get_me, update_me))
        .routes(routes!(change_password))
        .with_state(state)
}
