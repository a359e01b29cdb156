//! Permission Service

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::info;

use super::dto::{CreatePermissionRequest, PermissionResponse};
use super::entity::Permission;
use super::repository::PermissionRepository;
use crate::shared::operation::{OperationError, OperationResult};
use crate::shared::validation::Validator;

/// Lowercase dotted segments, e.g. `users.read` or `workorders.*`
static PERMISSION_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_-]*(\.([a-z][a-z0-9_-]*|\*))+$").expect("valid permission pattern")
});

pub struct PermissionService {
    permissions: Arc<PermissionRepository>,
}

impl PermissionService {
    pub fn new(permissions: Arc<PermissionRepository>) -> Self {
        Self { permissions }
    }

    pub async fn create_permission(&self, req: CreatePermissionRequest) -> OperationResult<PermissionResponse> {
        let name = req.name.trim();
        let mut v = Validator::new();
        v.required("name", name)
            .max_len("name", Some(name), 256)
            .max_len("category", req.category.as_deref(), 128)
            .max_len("description", req.description.as_deref(), 1024);
        if !name.is_empty() && !PERMISSION_NAME_RE.is_match(name) {
            v.add("name", "Permission names are lowercase dotted segments, e.g. users.read");
        }
        v.finish()?;

        if self.permissions.name_taken(name).await? {
            return Err(OperationError::conflict(
                "DUPLICATE_PERMISSION_NAME",
                format!("Permission '{}' already exists", name),
            ));
        }

        let mut permission = Permission::new(name);
        if let Some(description) = req.description.filter(|d| !d.trim().is_empty()) {
            permission = permission.with_description(description.trim());
        }
        if let Some(category) = req.category.filter(|c| !c.trim().is_empty()) {
            permission = permission.with_category(category.trim());
        }

        self.permissions.add(&permission).await?;
        info!(permission_id = %permission.id, name = %permission.name, "Permission created");
        Ok(permission.into())
    }

    pub async fn list_permissions(&self, category: Option<&str>) -> OperationResult<Vec<PermissionResponse>> {
        let permissions = self.permissions.list(category).await?;
        Ok(permissions.into_iter().map(PermissionResponse::from).collect())
    }

    pub async fn get_permission(&self, id: &str) -> OperationResult<PermissionResponse> {
        Ok(self.load(id).await?.into())
    }

    /// Soft delete; the name stays reserved.
    pub async fn delete_permission(&self, id: &str) -> OperationResult<()> {
        let permission = self.load(id).await?;
        if !self.permissions.soft_delete(&permission.id).await? {
            return Err(OperationError::not_found("Permission", id));
        }
        info!(permission_id = %id, name = %permission.name, "Permission deleted");
        Ok(())
    }

    async fn load(&self, id: &str) -> OperationResult<Permission> {
        self.permissions
            .get_by_id(id)
            .await?
            .filter(|p| !p.is_deleted)
            .ok_or_else(|| OperationError::not_found("Permission", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    async fn service() -> PermissionService {
        let pool = connect_in_memory().await.unwrap();
        PermissionService::new(Arc::new(PermissionRepository::new(pool)))
    }

    fn request(name: &str) -> CreatePermissionRequest {
        CreatePermissionRequest {
            name: name.to_string(),
            description: Some("Approve work orders".to_string()),
            category: Some("WorkOrders".to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let svc = service().await;
        svc.create_permission(request("workorders.approve")).await.unwrap();

        let err = svc.create_permission(request("workorders.approve")).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_PERMISSION_NAME");
    }

    #[tokio::test]
    async fn test_name_format_validated() {
        let svc = service().await;
        let err = svc.create_permission(request("Work Orders")).await.unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
        assert!(svc.create_permission(request("assets.*")).await.is_ok());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_and_reserves_name() {
        let svc = service().await;
        let created = svc.create_permission(request("assets.write")).await.unwrap();

        svc.delete_permission(&created.id).await.unwrap();
        assert!(svc.get_permission(&created.id).await.is_err());
        assert!(svc.list_permissions(None).await.unwrap().is_empty());
        assert!(svc.delete_permission(&created.id).await.is_err());

        let err = svc.create_permission(request("assets.write")).await.unwrap_err();
        assert!(matches!(err, OperationError::Conflict { .. }));
    }
}
