//! Users Admin API
//!
//! REST endpoints for user management under `/api/users`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::dto::{AssignRolesRequest, CreateUserRequest, LockUserRequest, UpdateUserRequest, UserResponse, UsersQuery};
use super::service::UserService;
use crate::role::dto::RoleResponse;
use crate::shared::api_common::{CreatedResponse, PaginatedResponse};
use crate::shared::authorization::{policies, PolicyMap};
use crate::shared::error::PlatformError;
use crate::shared::extract::Json;
use crate::shared::middleware::Authenticated;

#[derive(Clone)]
pub struct UsersState {
    pub service: Arc<UserService>,
    pub policies: Arc<PolicyMap>,
}

/// Create a user
#[utoipa::path(
    post,
    path = "",
    tag = "users",
    operation_id = "postApiUsers",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User name or email already in use")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;

    let user = state.service.create_user(req, Some(&auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(user.id))))
}

/// List users
#[utoipa::path(
    get,
    path = "",
    tag = "users",
    operation_id = "getApiUsers",
    params(UsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<UsersState>,
    auth: Authenticated,
    Query(query): Query<UsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, PlatformError> {
    state.policies.require(policies::USERS_READ, &auth)?;

    let page = state
        .service
        .list_users(
            query.search.as_deref(),
            query.pagination.page(),
            query.pagination.size(),
        )
        .await?;
    Ok(Json(page))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "users",
    operation_id = "getApiUsersById",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, PlatformError> {
    state.policies.require(policies::USERS_READ, &auth)?;
    Ok(Json(state.service.get_user(&id).await?))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "users",
    operation_id = "putApiUsersById",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation error or mismatched id"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User name or email already in use")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;
    Ok(Json(state.service.update_user(&id, req).await?))
}

/// Delete a user (soft delete)
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "users",
    operation_id = "deleteApiUsersById",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Cannot delete own account")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;
    state.service.delete_user(&id, &auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lock a user
#[utoipa::path(
    post,
    path = "/{id}/lock",
    tag = "users",
    operation_id = "postApiUsersByIdLock",
    params(("id" = String, Path, description = "User id")),
    request_body = LockUserRequest,
    responses(
        (status = 200, description = "User locked", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn lock_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<LockUserRequest>,
) -> Result<Json<UserResponse>, PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;
    Ok(Json(state.service.lock_user(&id, req, &auth.user_name).await?))
}

/// Unlock a user
#[utoipa::path(
    post,
    path = "/{id}/unlock",
    tag = "users",
    operation_id = "postApiUsersByIdUnlock",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User unlocked", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlock_user(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;
    Ok(Json(state.service.unlock_user(&id, &auth.user_name).await?))
}

/// Roles assigned to a user
#[utoipa::path(
    get,
    path = "/{id}/roles",
    tag = "users",
    operation_id = "getApiUsersByIdRoles",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Assigned roles", body = Vec<RoleResponse>),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_roles(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<RoleResponse>>, PlatformError> {
    state.policies.require(policies::USERS_READ, &auth)?;
    Ok(Json(state.service.get_user_roles(&id).await?))
}

/// Assign roles to a user
#[utoipa::path(
    post,
    path = "/{id}/roles",
    tag = "users",
    operation_id = "postApiUsersByIdRoles",
    params(("id" = String, Path, description = "User id")),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "Roles after assignment", body = Vec<RoleResponse>),
        (status = 404, description = "User or role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_roles(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<AssignRolesRequest>,
) -> Result<Json<Vec<RoleResponse>>, PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;
    Ok(Json(state.service.assign_roles(&id, req, Some(&auth.user_id)).await?))
}

/// Remove a role from a user
#[utoipa::path(
    delete,
    path = "/{id}/roles/{role_name}",
    tag = "users",
    operation_id = "deleteApiUsersByIdRolesByRoleName",
    params(
        ("id" = String, Path, description = "User id"),
        ("role_name" = String, Path, description = "Role name")
    ),
    responses(
        (status = 204, description = "Role removed"),
        (status = 404, description = "User, role or assignment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_role(
    State(state): State<UsersState>,
    auth: Authenticated,
    Path((id, role_name)): Path<(String, String)>,
) -> Result<StatusCode, PlatformError> {
    state.policies.require(policies::USERS_WRITE, &auth)?;
    state.service.remove_role(&id, &role_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn users_router(state: UsersState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_user, list_users))
        .routes(routes!(get_user, update_user, delete_user))
        .routes(routes!(lock_user))
        .routes(routes!(unlock_user))
        .routes(routes!(get_user_roles, assign_roles))
        .routes(routes!(remove_role))
        .with_state(state)
}
