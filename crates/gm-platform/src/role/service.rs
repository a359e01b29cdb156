//! Role Service

use std::sync::Arc;

use tracing::info;

use super::dto::{CreateRoleRequest, RoleResponse, SetRolePermissionsRequest, UpdateRoleRequest};
use super::entity::Role;
use super::repository::{RolePermissionRepository, RoleRepository};
use crate::permission::dto::PermissionResponse;
use crate::permission::entity::Permission;
use crate::permission::repository::PermissionRepository;
use crate::shared::operation::{OperationError, OperationResult};
use crate::shared::unit_of_work::UnitOfWork;
use crate::shared::validation::Validator;

const MAX_ROLE_NAME_LEN: usize = 256;

pub struct RoleService {
    roles: Arc<RoleRepository>,
    role_permissions: Arc<RolePermissionRepository>,
    permissions: Arc<PermissionRepository>,
}

impl RoleService {
    pub fn new(
        roles: Arc<RoleRepository>,
        role_permissions: Arc<RolePermissionRepository>,
        permissions: Arc<PermissionRepository>,
    ) -> Self {
        Self {
            roles,
            role_permissions,
            permissions,
        }
    }

    /// Creates the role with its initial grants in one transaction.
    pub async fn create_role(&self, req: CreateRoleRequest, actor: Option<&str>) -> OperationResult<RoleResponse> {
        Validator::new()
            .required("name", &req.name)
            .max_len("name", Some(&req.name), MAX_ROLE_NAME_LEN)
            .max_len("description", req.description.as_deref(), 1024)
            .finish()?;

        self.ensure_name_free(&req.name, None).await?;
        let permissions = self.resolve_permissions(&req.permissions).await?;

        let mut role = Role::new(&req.name);
        if let Some(description) = req.description.filter(|d| !d.trim().is_empty()) {
            role = role.with_description(description.trim());
        }

        let permission_ids: Vec<String> = permissions.iter().map(|p| p.id.clone()).collect();
        let mut uow = UnitOfWork::begin(self.roles.pool()).await?;
        self.roles.add_with(uow.conn(), &role).await?;
        self.role_permissions
            .replace_with(uow.conn(), &role.id, &permission_ids, actor)
            .await?;
        uow.commit().await?;

        info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(RoleResponse::from(role).with_permissions(names_of(&permissions)))
    }

    pub async fn get_role(&self, id: &str) -> OperationResult<RoleResponse> {
        let role = self.load(id).await?;
        self.to_response(role).await
    }

    pub async fn list_roles(&self, search: Option<&str>) -> OperationResult<Vec<RoleResponse>> {
        let roles = self.roles.list(search).await?;
        let mut out = Vec::with_capacity(roles.len());
        for role in roles {
            out.push(self.to_response(role).await?);
        }
        Ok(out)
    }

    /// System roles keep their name; only the description may change.
    pub async fn update_role(&self, id: &str, req: UpdateRoleRequest) -> OperationResult<RoleResponse> {
        if req.id.as_deref().is_some_and(|body_id| body_id != id) {
            return Err(OperationError::invalid_field("id", "The id in the body does not match the id in the route"));
        }

        let mut v = Validator::new();
        if let Some(name) = &req.name {
            v.required("name", name).max_len("name", Some(name), MAX_ROLE_NAME_LEN);
        }
        v.max_len("description", req.description.as_deref(), 1024).finish()?;

        let mut role = self.load(id).await?;

        if let Some(name) = req.name.as_deref().map(str::trim) {
            if name != role.name {
                if role.is_system {
                    return Err(OperationError::conflict(
                        "SYSTEM_ROLE",
                        format!("System role '{}' cannot be renamed", role.name),
                    ));
                }
                self.ensure_name_free(name, Some(id)).await?;
                role.rename(name);
            }
        }
        if let Some(description) = req.description {
            let description = description.trim().to_string();
            role.description = (!description.is_empty()).then_some(description);
            role.updated_at = Some(chrono::Utc::now());
        }

        self.roles.update(&role).await?;
        info!(role_id = %role.id, "Role updated");
        self.to_response(role).await
    }

    /// Physically removes the role; assignments and grants cascade.
    pub async fn delete_role(&self, id: &str) -> OperationResult<()> {
        let role = self.load(id).await?;
        if role.is_system {
            return Err(OperationError::conflict(
                "SYSTEM_ROLE",
                format!("System role '{}' cannot be deleted", role.name),
            ));
        }

        self.roles.delete(id).await?;
        info!(role_id = %id, name = %role.name, "Role deleted");
        Ok(())
    }

    pub async fn get_role_permissions(&self, id: &str) -> OperationResult<Vec<PermissionResponse>> {
        let role = self.load(id).await?;
        let permissions = self.role_permissions.permissions_for_role(&role.id).await?;
        Ok(permissions.into_iter().map(PermissionResponse::from).collect())
    }

    /// Replace the role's grants with exactly the named permissions.
    pub async fn set_role_permissions(
        &self,
        id: &str,
        req: SetRolePermissionsRequest,
        actor: Option<&str>,
    ) -> OperationResult<Vec<PermissionResponse>> {
        let role = self.load(id).await?;
        let permissions = self.resolve_permissions(&req.permissions).await?;
        let permission_ids: Vec<String> = permissions.iter().map(|p| p.id.clone()).collect();

        let mut uow = UnitOfWork::begin(self.roles.pool()).await?;
        self.role_permissions
            .replace_with(uow.conn(), &role.id, &permission_ids, actor)
            .await?;
        uow.commit().await?;

        info!(role_id = %role.id, count = permission_ids.len(), "Role permissions replaced");
        self.get_role_permissions(id).await
    }

    async fn load(&self, id: &str) -> OperationResult<Role> {
        self.roles
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| OperationError::not_found("Role", id))
    }

    async fn to_response(&self, role: Role) -> OperationResult<RoleResponse> {
        let permissions = self.role_permissions.permissions_for_role(&role.id).await?;
        Ok(RoleResponse::from(role).with_permissions(names_of(&permissions)))
    }

    async fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> OperationResult<()> {
        if self.roles.name_taken(name, except_id).await? {
            return Err(OperationError::conflict(
                "DUPLICATE_ROLE_NAME",
                format!("A role named '{}' already exists", name.trim()),
            ));
        }
        Ok(())
    }

    /// Every name must resolve to a live permission.
    async fn resolve_permissions(&self, names: &[String]) -> OperationResult<Vec<Permission>> {
        let mut wanted: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        wanted.sort();
        wanted.dedup();

        let found = self.permissions.find_by_names(&wanted).await?;
        let unknown: Vec<&String> = wanted.iter().filter(|n| !found.iter().any(|p| &p.name == *n)).collect();
        if !unknown.is_empty() {
            let list = unknown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
            return Err(OperationError::invalid_field("permissions", format!("Unknown permissions: {}", list)));
        }
        Ok(found)
    }
}

fn names_of(permissions: &[Permission]) -> Vec<String> {
    let mut names: Vec<String> = permissions.iter().map(|p| p.name.clone()).collect();
    names.sort();
    names
}
