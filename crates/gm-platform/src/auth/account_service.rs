//! Account Service
//!
//! Self-service operations on the signed-in user's own account.

use std::sync::Arc;

use tracing::info;

use super::dto::{ChangePasswordRequest, UpdateProfileRequest};
use super::identity::{Authenticatable, IdentityManager, RoleAssignable};
use super::refresh_token::REASON_PASSWORD_CHANGED;
use super::refresh_token_repository::RefreshTokenRepository;
use crate::security::entity::{events, SecurityLog};
use crate::security::service::SecurityService;
use crate::shared::middleware::ClientInfo;
use crate::shared::operation::{OperationError, OperationResult};
use crate::shared::unit_of_work::UnitOfWork;
use crate::shared::validation::Validator;
use crate::user::dto::UserResponse;
use crate::user::entity::User;
use crate::user::repository::UserRepository;

pub struct AccountService {
    users: Arc<UserRepository>,
    refresh_tokens: Arc<RefreshTokenRepository>,
    identity: Arc<IdentityManager>,
    security: SecurityService,
}

impl AccountService {
    pub fn new(
        users: Arc<UserRepository>,
        refresh_tokens: Arc<RefreshTokenRepository>,
        identity: Arc<IdentityManager>,
        security: SecurityService,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            identity,
            security,
        }
    }

    pub async fn get_profile(&self, user_id: &str) -> OperationResult<UserResponse> {
        let user = self.load(user_id).await?;
        self.to_response(user).await
    }

    /// Absent fields are left unchanged; an empty string clears the field.
    pub async fn update_profile(&self, user_id: &str, req: UpdateProfileRequest) -> OperationResult<UserResponse> {
        let mut v = Validator::new();
        if let Some(email) = &req.email {
            v.required("email", email).email("email", email);
        }
        v.max_len("firstName", req.first_name.as_deref(), 256)
            .max_len("lastName", req.last_name.as_deref(), 256)
            .max_len("phoneNumber", req.phone_number.as_deref(), 32)
            .max_len("profilePictureUrl", req.profile_picture_url.as_deref(), 2048)
            .finish()?;

        let mut user = self.load(user_id).await?;

        if let Some(email) = req.email.as_deref() {
            if self.users.email_taken(email, Some(user_id)).await? {
                return Err(OperationError::conflict(
                    "DUPLICATE_EMAIL",
                    format!("Email '{}' is already registered", email.trim()),
                ));
            }
            user.set_email(email);
        }
        if let Some(first_name) = req.first_name {
            user.first_name = non_empty(first_name);
        }
        if let Some(last_name) = req.last_name {
            user.last_name = non_empty(last_name);
        }
        if let Some(phone) = req.phone_number {
            user.phone_number = non_empty(phone);
        }
        if let Some(url) = req.profile_picture_url {
            user.profile_picture_url = non_empty(url);
        }
        user.touch();

        self.users.update(&user).await?;
        info!(user_id, "Profile updated");
        self.to_response(user).await
    }

    /// Verifies the current password, sets the new one and signs out every
    /// session by revoking all refresh tokens.
    pub async fn change_password(&self, user_id: &str, req: ChangePasswordRequest, client: &ClientInfo) -> OperationResult<()> {
        Validator::new()
            .required("currentPassword", &req.current_password)
            .required("newPassword", &req.new_password)
            .matches("confirmPassword", &req.confirm_password, &req.new_password)
            .finish()?;

        let mut user = self.load(user_id).await?;

        if !self.identity.check_password(&user, &req.current_password)? {
            self.security
                .log_event(
                    SecurityLog::new(events::PASSWORD_CHANGED, "Password change refused: wrong current password", false)
                        .for_user(Some(user_id))
                        .with_client(client.ip(), client.agent()),
                )
                .await;
            return Err(OperationError::invalid_field("currentPassword", "Current password is incorrect"));
        }
        if req.new_password == req.current_password {
            return Err(OperationError::invalid_field(
                "newPassword",
                "New password must differ from the current password",
            ));
        }

        self.identity.set_password(&mut user, "newPassword", &req.new_password)?;

        let mut uow = UnitOfWork::begin(self.users.pool()).await?;
        self.users.update_with(uow.conn(), &user).await?;
        self.refresh_tokens
            .revoke_all_for_user_with(uow.conn(), user_id, client.ip(), REASON_PASSWORD_CHANGED)
            .await?;
        uow.commit().await?;

        info!(user_id, "Password changed");
        self.security
            .log_event(
                SecurityLog::new(events::PASSWORD_CHANGED, "Password changed", true)
                    .for_user(Some(user_id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        self.security
            .notify(user_id, "Password changed", "Your password was changed. All sessions were signed out.")
            .await;
        Ok(())
    }

    async fn load(&self, user_id: &str) -> OperationResult<User> {
        self.users
            .find_active_by_id(user_id)
            .await?
            .ok_or_else(|| OperationError::not_found("User", user_id))
    }

    async fn to_response(&self, user: User) -> OperationResult<UserResponse> {
        let roles = self.identity.role_names(&user.id).await?;
        Ok(UserResponse::from(user).with_roles(roles))
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
