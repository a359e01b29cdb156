//! User administration endpoints

use crate::client::Client;
use crate::error::Result;
use crate::models::{
    CreateUserRequest, CreatedResponse, LockUserRequest, PaginatedResponse, RoleResponse, RolesBody,
    UpdateUserRequest, UserResponse,
};

/// `/api/users`
pub struct UsersApi<'a> {
    client: &'a Client,
}

impl<'a> UsersApi<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Create a user, returning its id.
    pub async fn create(&self, req: &CreateUserRequest) -> Result<String> {
        let created: CreatedResponse = self.client.post(&["api", "users"], req).await?;
        Ok(created.id)
    }

    /// One page of users (zero-based page), optionally filtered by a search term.
    pub async fn list(&self, page: u32, size: u32, search: Option<&str>) -> Result<PaginatedResponse<UserResponse>> {
        let mut query = vec![("page", page.to_string()), ("size", size.to_string())];
        if let Some(term) = search {
            query.push(("search", term.to_string()));
        }
        self.client.get(&["api", "users"], &query).await
    }

    pub async fn get(&self, id: &str) -> Result<UserResponse> {
        self.client.get(&["api", "users", id], &[]).await
    }

    pub async fn update(&self, req: &UpdateUserRequest) -> Result<UserResponse> {
        self.client.put(&["api", "users", req.id.as_str()], req).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&["api", "users", id]).await
    }

    pub async fn lock(&self, id: &str, req: &LockUserRequest) -> Result<UserResponse> {
        self.client.post(&["api", "users", id, "lock"], req).await
    }

    pub async fn unlock(&self, id: &str) -> Result<UserResponse> {
        self.client.post(&["api", "users", id, "unlock"], &serde_json::json!({})).await
    }

    pub async fn roles(&self, id: &str) -> Result<Vec<RoleResponse>> {
        self.client.get(&["api", "users", id, "roles"], &[]).await
    }

    pub async fn assign_roles(&self, id: &str, roles: &[String]) -> Result<Vec<RoleResponse>> {
        self.client.post(&["api", "users", id, "roles"], &RolesBody { roles }).await
    }

    pub async fn remove_role(&self, id: &str, role_name: &str) -> Result<()> {
        self.client.delete(&["api", "users", id, "roles", role_name]).await
    }
}
