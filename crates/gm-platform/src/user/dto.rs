//! User request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::entity::User;
use crate::shared::api_common::PaginationParams;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
    /// Must equal `password` when given
    pub confirm_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    /// Role names; the `User` role when empty
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Full update. `id` must match the id in the route.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_active: Option<bool>,
    pub email_confirmed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockUserRequest {
    pub reason: Option<String>,
    /// Indefinite when absent
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub email_confirmed: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_active: bool,
    pub is_locked_out: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub lock_reason: Option<String>,
    pub access_failed_count: i32,
    pub last_login_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserResponse {
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            is_locked_out: u.is_locked_out(Utc::now()),
            full_name: u.full_name(),
            id: u.id,
            user_name: u.user_name,
            email: u.email,
            email_confirmed: u.email_confirmed,
            first_name: u.first_name,
            last_name: u.last_name,
            phone_number: u.phone_number,
            profile_picture_url: u.profile_picture_url,
            is_active: u.is_active,
            lockout_end: u.lockout_end,
            lock_reason: u.lock_reason,
            access_failed_count: u.access_failed_count,
            last_login_date: u.last_login_date,
            created_at: u.created_at,
            updated_at: u.updated_at,
            roles: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UsersQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Matches user name, email, first or last name
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_hides_credentials() {
        let user = User::new("tech.one", "tech.one@plant.example", "$argon2id$secret");
        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(json.contains("\"userName\":\"tech.one\""));
        assert!(json.contains("\"isLockedOut\":false"));
        assert!(!json.contains("argon2"));
    }

    #[test]
    fn test_update_request_camel_case() {
        let req: UpdateUserRequest = serde_json::from_str(
            r#"{"id":"U1","userName":"a.b","email":"a@b.io","isActive":false}"#,
        )
        .unwrap();
        assert_eq!(req.user_name, "a.b");
        assert_eq!(req.is_active, Some(false));
    }
}
