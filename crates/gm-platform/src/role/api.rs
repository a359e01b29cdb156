//! Roles Admin API
//!
//! REST endpoints for role management under `/api/roles`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::dto::{CreateRoleRequest, RoleListResponse, RoleResponse, RolesQuery, SetRolePermissionsRequest, UpdateRoleRequest};
use super::service::RoleService;
use crate::permission::dto::PermissionResponse;
use crate::shared::api_common::CreatedResponse;
use crate::shared::authorization::{policies, PolicyMap};
use crate::shared::error::PlatformError;
use crate::shared::extract::Json;
use crate::shared::middleware::Authenticated;

#[derive(Clone)]
pub struct RolesState {
    pub service: Arc<RoleService>,
    pub policies: Arc<PolicyMap>,
}

/// Create a role
#[utoipa::path(
    post,
    path = "",
    tag = "roles",
    operation_id = "postApiRoles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = CreatedResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Duplicate role name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), PlatformError> {
    state.policies.require(policies::ROLES_WRITE, &auth)?;

    let role = state.service.create_role(req, Some(&auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(role.id))))
}

/// List roles
#[utoipa::path(
    get,
    path = "",
    tag = "roles",
    operation_id = "getApiRoles",
    params(RolesQuery),
    responses(
        (status = 200, description = "List of roles", body = RoleListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<RolesState>,
    auth: Authenticated,
    Query(query): Query<RolesQuery>,
) -> Result<Json<RoleListResponse>, PlatformError> {
    state.policies.require(policies::ROLES_READ, &auth)?;

    let roles = state.service.list_roles(query.search.as_deref()).await?;
    let total = roles.len();
    Ok(Json(RoleListResponse { roles, total }))
}

/// Get a role by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "roles",
    operation_id = "getApiRolesById",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role found", body = RoleResponse),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<RoleResponse>, PlatformError> {
    state.policies.require(policies::ROLES_READ, &auth)?;
    Ok(Json(state.service.get_role(&id).await?))
}

/// Update a role
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "roles",
    operation_id = "putApiRolesById",
    params(("id" = String, Path, description = "Role id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 400, description = "Validation error or mismatched id"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Duplicate name or system role")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, PlatformError> {
    state.policies.require(policies::ROLES_WRITE, &auth)?;
    Ok(Json(state.service.update_role(&id, req).await?))
}

/// Delete a role
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "roles",
    operation_id = "deleteApiRolesById",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "System roles cannot be deleted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, PlatformError> {
    state.policies.require(policies::ROLES_WRITE, &auth)?;
    state.service.delete_role(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Permissions granted to a role
#[utoipa::path(
    get,
    path = "/{id}/permissions",
    tag = "roles",
    operation_id = "getApiRolesByIdPermissions",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Granted permissions", body = Vec<PermissionResponse>),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_role_permissions(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<Vec<PermissionResponse>>, PlatformError> {
    state.policies.require(policies::ROLES_READ, &auth)?;
    Ok(Json(state.service.get_role_permissions(&id).await?))
}

/// Replace the permissions granted to a role
#[utoipa::path(
    put,
    path = "/{id}/permissions",
    tag = "roles",
    operation_id = "putApiRolesByIdPermissions",
    params(("id" = String, Path, description = "Role id")),
    request_body = SetRolePermissionsRequest,
    responses(
        (status = 200, description = "Granted permissions", body = Vec<PermissionResponse>),
        (status = 400, description = "Unknown permission"),
        (status = 404, description = "Role not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_role_permissions(
    State(state): State<RolesState>,
    auth: Authenticated,
    Path(id): Path<String>,
    Json(req): Json<SetRolePermissionsRequest>,
) -> Result<Json<Vec<PermissionResponse>>, PlatformError> {
    state.policies.require(policies::ROLES_WRITE, &auth)?;
    Ok(Json(
        state
            .service
            .set_role_permissions(&id, req, Some(&auth.user_id))
            .await?,
    ))
}

pub fn roles_router(state: RolesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_role, list_roles))
        .routes(routes!(get_role, update_role, delete_role))
        .routes(routes!(get_role_permissions, set_role_permissions))
        .with_state(state)
}
