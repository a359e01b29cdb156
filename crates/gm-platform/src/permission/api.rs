//! Permissions Admin API

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::dto::{CreatePermissionRequest, PermissionListResponse, PermissionResponse, PermissionsQuery};
use super::service::PermissionService;
use crate::shared::api_common::CreatedResponse;
use crate::shared::authorization::{policies, PolicyMap};
use crate::shared::error::PlatformError;
use crate::shared::extract::Json;
use crate::shared::middleware::Authenticated;

#[derive(Clone)]
pub struct PermissionsState {
    pub service: Arc<PermissionService>,
    pub policies: Arc<PolicyMap>,
}

/// Create a permission
#[utoipa::path(
    post,
    path = "",
    tag = "permissions",
    operation_id = "postApiPermissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = CreatedResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Duplicate permission name")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_permission(
    State(state): State<PermissionsState>,
    auth: Authenticated,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), PlatformError> {
    state.policies.require(policies::PERMISSIONS_WRITE, &auth)?;

    let permission = state.service.create_permission(req).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(permission.id))))
}

/// List permissions
#[utoipa::path(
    get,
    path = "",
    tag = "permissions",
    operation_id = "getApiPermissions",
    params(PermissionsQuery),
    responses(
        (status = 200, description = "List of permissions", body = PermissionListResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_permissions(
    State(state): State<PermissionsState>,
    auth: Authenticated,
    Query(query): Query<PermissionsQuery>,
) -> Result<Json<PermissionListResponse>, PlatformError> {
    state.policies.require(policies::PERMISSIONS_READ, &auth)?;

    let permissions = state.service.list_permissions(query.category.as_deref()).await?;
    let total = permissions.len();
    Ok(Json(PermissionListResponse { permissions, total }))
}

/// Get a permission by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "permissions",
    operation_id = "getApiPermissionsById",
    params(("id" = String, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission found", body = PermissionResponse),
        (status = 404, description = "Permission not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_permission(
    State(state): State<PermissionsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<PermissionResponse>, PlatformError> {
    state.policies.require(policies::PERMISSIONS_READ, &auth)?;
    Ok(Json(state.service.get_permission(&id).await?))
}

/// Delete a permission (soft delete)
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "permissions",
    operation_id = "deleteApiPermissionsById",
    params(("id" = String, Path, description = "Permission id")),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 404, description = "Permission not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_permission(
    State(state): State<PermissionsState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<StatusCode, PlatformError> {
    state.policies.require(policies::PERMISSIONS_WRITE, &auth)?;
    state.service.delete_permission(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn permissions_router(state: PermissionsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_permission, list_permissions))
        .routes(routes!(get_permission, delete_permission))
        .with_state(state)
}
