//! Role administration endpoints

use crate::client::Client;
use crate::error::Result;
use crate::models::{
    CreateRoleRequest, CreatedResponse, PermissionResponse, PermissionsBody, RoleListResponse, RoleResponse,
    UpdateRoleRequest,
};

/// `/api/roles`
pub struct RolesApi<'a> {
    client: &'a Client,
}

impl<'a> RolesApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, req: &CreateRoleRequest) -> Result<String> {
        let created: CreatedResponse = self.client.post(&["api", "roles"], req).await?;
        Ok(created.id)
    }

    pub async fn list(&self, search: Option<&str>) -> Result<RoleListResponse> {
        let query: Vec<(&str, String)> = search.map(|s| ("search", s.to_string())).into_iter().collect();
        self.client.get(&["api", "roles"], &query).await
    }

    pub async fn get(&self, id: &str) -> Result<RoleResponse> {
        self.client.get(&["api", "roles", id], &[]).await
    }

    pub async fn update(&self, id: &str, req: &UpdateRoleRequest) -> Result<RoleResponse> {
        self.client.put(&["api", "roles", id], req).await
    }

    /// System roles cannot be deleted (409).
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&["api", "roles", id]).await
    }

    pub async fn permissions(&self, id: &str) -> Result<Vec<PermissionResponse>> {
        self.client.get(&["api", "roles", id, "permissions"], &[]).await
    }

    /// Replace the role's permission set.
    pub async fn set_permissions(&self, id: &str, permissions: &[String]) -> Result<Vec<PermissionResponse>> {
        self.client
            .put(&["api", "roles", id, "permissions"], &PermissionsBody { permissions })
            .await
    }
}
