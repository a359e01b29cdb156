//! User Service
//!
//! Administrative user management. Every method returns an
//! `OperationResult`; HTTP mapping happens in the API layer.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::info;

use super::dto::{AssignRolesRequest, CreateUserRequest, LockUserRequest, UpdateUserRequest, UserResponse};
use super::entity::User;
use super::repository::{UserRepository, UserRoleRepository};
use crate::auth::identity::{IdentityManager, RoleAssignable};
use crate::auth::refresh_token::REASON_USER_DELETED;
use crate::auth::refresh_token_repository::RefreshTokenRepository;
use crate::role::dto::RoleResponse;
use crate::role::entity::{roles, Role};
use crate::role::repository::RoleRepository;
use crate::security::entity::{events, SecurityLog};
use crate::security::service::SecurityService;
use crate::shared::api_common::PaginatedResponse;
use crate::shared::operation::{OperationError, OperationResult};
use crate::shared::unit_of_work::UnitOfWork;
use crate::shared::validation::Validator;

const MAX_NAME_LEN: usize = 256;

pub struct UserService {
    users: Arc<UserRepository>,
    user_roles: Arc<UserRoleRepository>,
    roles: Arc<RoleRepository>,
    refresh_tokens: Arc<RefreshTokenRepository>,
    identity: Arc<IdentityManager>,
    security: SecurityService,
}

impl UserService {
    pub fn new(
        users: Arc<UserRepository>,
        user_roles: Arc<UserRoleRepository>,
        roles: Arc<RoleRepository>,
        refresh_tokens: Arc<RefreshTokenRepository>,
        identity: Arc<IdentityManager>,
        security: SecurityService,
    ) -> Self {
        Self {
            users,
            user_roles,
            roles,
            refresh_tokens,
            identity,
            security,
        }
    }

    pub async fn create_user(&self, req: CreateUserRequest, actor: Option<&str>) -> OperationResult<UserResponse> {
        let mut v = Validator::new();
        v.required("userName", &req.user_name)
            .user_name("userName", &req.user_name)
            .max_len("userName", Some(&req.user_name), MAX_NAME_LEN)
            .required("email", &req.email)
            .email("email", &req.email)
            .max_len("email", Some(&req.email), MAX_NAME_LEN)
            .required("password", &req.password)
            .max_len("firstName", req.first_name.as_deref(), MAX_NAME_LEN)
            .max_len("lastName", req.last_name.as_deref(), MAX_NAME_LEN);
        if let Some(confirm) = &req.confirm_password {
            v.matches("confirmPassword", confirm, &req.password);
        }
        v.finish()?;

        self.identity.passwords().validate_password("password", &req.password)?;
        self.ensure_unique(&req.user_name, &req.email, None).await?;

        let role_names = if req.roles.is_empty() {
            vec![roles::USER.to_string()]
        } else {
            req.roles.clone()
        };
        let roles = self.resolve_roles(&role_names).await.map_err(|e| match e {
            OperationError::NotFound { id, .. } => {
                OperationError::invalid_field("roles", format!("Role '{}' does not exist", id))
            }
            other => other,
        })?;

        let hash = self.identity.passwords().hash_unchecked(&req.password)?;
        let mut user = User::new(&req.user_name, &req.email, hash)
            .with_names(trimmed(req.first_name), trimmed(req.last_name));
        user.phone_number = trimmed(req.phone_number);

        let mut uow = UnitOfWork::begin(self.users.pool()).await?;
        self.users.add_with(uow.conn(), &user).await?;
        for role in &roles {
            self.user_roles.assign_with(uow.conn(), &user.id, &role.id, actor).await?;
        }
        uow.commit().await?;

        counter!("gestmantia_users_created_total").increment(1);
        info!(user_id = %user.id, user_name = %user.user_name, "User created");

        let names = roles.into_iter().map(|r| r.name).collect();
        Ok(UserResponse::from(user).with_roles(names))
    }

    /// Missing and soft-deleted users are both reported as not found.
    pub async fn get_user(&self, id: &str) -> OperationResult<UserResponse> {
        let user = self.load(id).await?;
        self.to_response(user).await
    }

    pub async fn list_users(&self, search: Option<&str>, page: u32, size: u32) -> OperationResult<PaginatedResponse<UserResponse>> {
        let (users, total) = self.users.search(search, page, size).await?;

        let mut data = Vec::with_capacity(users.len());
        for user in users {
            data.push(self.to_response(user).await?);
        }
        Ok(PaginatedResponse::new(data, page, size, total.max(0) as u64))
    }

    pub async fn update_user(&self, id: &str, req: UpdateUserRequest) -> OperationResult<UserResponse> {
        if req.id != id {
            return Err(OperationError::invalid_field("id", "The id in the body does not match the id in the route"));
        }

        Validator::new()
            .required("userName", &req.user_name)
            .user_name("userName", &req.user_name)
            .max_len("userName", Some(&req.user_name), MAX_NAME_LEN)
            .required("email", &req.email)
            .email("email", &req.email)
            .max_len("email", Some(&req.email), MAX_NAME_LEN)
            .max_len("firstName", req.first_name.as_deref(), MAX_NAME_LEN)
            .max_len("lastName", req.last_name.as_deref(), MAX_NAME_LEN)
            .finish()?;

        let mut user = self.load(id).await?;
        self.ensure_unique(&req.user_name, &req.email, Some(id)).await?;

        user.set_user_name(&req.user_name);
        user.set_email(&req.email);
        user.first_name = trimmed(req.first_name);
        user.last_name = trimmed(req.last_name);
        user.phone_number = trimmed(req.phone_number);
        user.profile_picture_url = trimmed(req.profile_picture_url);
        if let Some(active) = req.is_active {
            user.is_active = active;
        }
        if let Some(confirmed) = req.email_confirmed {
            user.email_confirmed = confirmed;
        }
        user.touch();

        self.users.update(&user).await?;
        info!(user_id = %user.id, "User updated");
        self.to_response(user).await
    }

    /// Soft delete, deactivate and revoke every refresh token, atomically.
    pub async fn delete_user(&self, id: &str, actor_id: &str) -> OperationResult<()> {
        if id == actor_id {
            return Err(OperationError::conflict("CANNOT_DELETE_SELF", "You cannot delete your own account"));
        }

        let mut user = self.load(id).await?;
        user.soft_delete();

        let mut uow = UnitOfWork::begin(self.users.pool()).await?;
        self.users.update_with(uow.conn(), &user).await?;
        let revoked = self
            .refresh_tokens
            .revoke_all_for_user_with(uow.conn(), id, None, REASON_USER_DELETED)
            .await?;
        uow.commit().await?;

        info!(user_id = %id, revoked_tokens = revoked, "User deleted");
        self.security
            .log_event(
                SecurityLog::new(events::USER_DELETED, format!("User {} deleted by {}", user.user_name, actor_id), true)
                    .for_user(Some(id)),
            )
            .await;
        Ok(())
    }

    pub async fn lock_user(&self, id: &str, req: LockUserRequest, actor: &str) -> OperationResult<UserResponse> {
        if req.until.is_some_and(|until| until <= Utc::now()) {
            return Err(OperationError::invalid_field("until", "Lock end must be in the future"));
        }

        let mut user = self.load(id).await?;
        let reason = req
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Locked by an administrator".to_string());
        user.lock(&reason, req.until);
        self.users.update(&user).await?;

        info!(user_id = %id, until = ?user.lockout_end, "User locked");
        self.security
            .log_event(
                SecurityLog::new(events::ACCOUNT_LOCKED, format!("Locked by {}: {}", actor, reason), true)
                    .for_user(Some(id)),
            )
            .await;
        self.security
            .notify(id, "Account locked", &format!("Your account has been locked: {}", reason))
            .await;

        self.to_response(user).await
    }

    /// Clears the lock and the failed sign-in count.
    pub async fn unlock_user(&self, id: &str, actor: &str) -> OperationResult<UserResponse> {
        let mut user = self.load(id).await?;
        user.unlock();
        self.users.update(&user).await?;

        info!(user_id = %id, "User unlocked");
        self.security
            .log_event(
                SecurityLog::new(events::ACCOUNT_UNLOCKED, format!("Unlocked by {}", actor), true).for_user(Some(id)),
            )
            .await;

        self.to_response(user).await
    }

    pub async fn get_user_roles(&self, id: &str) -> OperationResult<Vec<RoleResponse>> {
        let user = self.load(id).await?;
        let roles = self.identity.roles_of(&user.id).await?;
        Ok(roles.into_iter().map(RoleResponse::from).collect())
    }

    /// Adds the roles; roles already held are kept. Returns the full set.
    pub async fn assign_roles(&self, id: &str, req: AssignRolesRequest, actor: Option<&str>) -> OperationResult<Vec<RoleResponse>> {
        if req.roles.iter().all(|r| r.trim().is_empty()) {
            return Err(OperationError::invalid_field("roles", "At least one role is required"));
        }

        let user = self.load(id).await?;
        let roles = self.resolve_roles(&req.roles).await?;
        for role in &roles {
            self.identity.add_to_role(&user.id, role, actor).await?;
        }

        info!(user_id = %id, roles = ?req.roles, "Roles assigned");
        self.get_user_roles(id).await
    }

    pub async fn remove_role(&self, id: &str, role_name: &str) -> OperationResult<()> {
        let user = self.load(id).await?;
        let role = self
            .roles
            .find_by_name(role_name)
            .await?
            .ok_or_else(|| OperationError::not_found("Role", role_name))?;

        if !self.identity.remove_from_role(&user.id, &role).await? {
            return Err(OperationError::not_found("UserRole", format!("{}/{}", id, role.name)));
        }

        info!(user_id = %id, role = %role.name, "Role removed");
        Ok(())
    }

    async fn load(&self, id: &str) -> OperationResult<User> {
        self.users
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| OperationError::not_found("User", id))
    }

    async fn to_response(&self, user: User) -> OperationResult<UserResponse> {
        let roles = self.identity.role_names(&user.id).await?;
        Ok(UserResponse::from(user).with_roles(roles))
    }

    async fn ensure_unique(&self, user_name: &str, email: &str, except_id: Option<&str>) -> OperationResult<()> {
        if self.users.user_name_taken(user_name, except_id).await? {
            return Err(OperationError::conflict(
                "DUPLICATE_USER_NAME",
                format!("User name '{}' is already taken", user_name.trim()),
            ));
        }
        if self.users.email_taken(email, except_id).await? {
            return Err(OperationError::conflict(
                "DUPLICATE_EMAIL",
                format!("Email '{}' is already registered", email.trim()),
            ));
        }
        Ok(())
    }

    /// Every name must resolve to a live role.
    async fn resolve_roles(&self, names: &[String]) -> OperationResult<Vec<Role>> {
        let wanted: BTreeSet<String> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(|n| n.to_uppercase())
            .collect();
        let found = self
            .roles
            .find_by_names(&wanted.iter().cloned().collect::<Vec<_>>())
            .await?;

        if let Some(missing) = wanted.iter().find(|n| !found.iter().any(|r| &r.normalized_name == *n)) {
            let original = names
                .iter()
                .find(|n| n.trim().to_uppercase() == *missing)
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| missing.clone());
            return Err(OperationError::not_found("Role", original));
        }
        Ok(found)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
