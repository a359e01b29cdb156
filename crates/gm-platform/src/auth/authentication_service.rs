//! Authentication Service
//!
//! Sign-in, registration, refresh token rotation and the password reset
//! flow. Failures that could reveal whether an account exists are reported
//! as plain invalid credentials.
//!
//! Refresh rotation: the presented token is revoked with reason
//! "Replaced by new token" and linked to its successor in the same
//! transaction that stores the successor. Presenting a token that was
//! already revoked is treated as theft: every live token of the user is
//! revoked and a critical alert is raised.

use std::sync::Arc;

use metrics::counter;
use tracing::{error, info, warn};

use super::dto::{AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest};
use super::email::{EmailMessage, EmailSender};
use super::identity::{Authenticatable, IdentityManager, SignInState};
use super::refresh_token::{RefreshToken, REASON_LOGOUT, REASON_PASSWORD_CHANGED, REASON_REPLACED, REASON_REUSE};
use super::refresh_token_repository::RefreshTokenRepository;
use super::token_service::{IssuedToken, TokenService};
use crate::security::entity::{events, AlertSeverity, SecurityAlert, SecurityLog};
use crate::security::service::SecurityService;
use crate::shared::middleware::ClientInfo;
use crate::shared::operation::{OperationError, OperationResult};
use crate::shared::unit_of_work::UnitOfWork;
use crate::shared::validation::Validator;
use crate::user::dto::{CreateUserRequest, UserResponse};
use crate::user::entity::User;
use crate::user::repository::UserRepository;
use crate::user::service::UserService;

pub const TOKEN_TYPE: &str = "Bearer";

pub struct AuthenticationService {
    identity: Arc<IdentityManager>,
    users: Arc<UserRepository>,
    user_service: Arc<UserService>,
    refresh_tokens: Arc<RefreshTokenRepository>,
    tokens: Arc<TokenService>,
    email: Arc<dyn EmailSender>,
    security: SecurityService,
    frontend_base_url: String,
}

impl AuthenticationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: Arc<IdentityManager>,
        users: Arc<UserRepository>,
        user_service: Arc<UserService>,
        refresh_tokens: Arc<RefreshTokenRepository>,
        tokens: Arc<TokenService>,
        email: Arc<dyn EmailSender>,
        security: SecurityService,
        frontend_base_url: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            users,
            user_service,
            refresh_tokens,
            tokens,
            email,
            security,
            frontend_base_url: frontend_base_url.into(),
        }
    }

    pub async fn login(&self, req: LoginRequest, client: &ClientInfo) -> OperationResult<AuthResponse> {
        Validator::new()
            .required("userNameOrEmail", &req.user_name_or_email)
            .required("password", &req.password)
            .finish()?;

        let identifier = req.user_name_or_email.trim();
        let Some(mut user) = self.identity.find_for_sign_in(identifier).await? else {
            self.login_failed(None, client, format!("Unknown user '{}'", identifier)).await;
            return Err(OperationError::invalid_credentials());
        };

        let state = self.identity.sign_in_state(&user);
        if state != SignInState::Allowed {
            self.login_failed(Some(&user.id), client, format!("Sign-in refused: account {}", state.as_str()))
                .await;
            return Err(OperationError::invalid_credentials());
        }

        if !self.identity.check_password(&user, &req.password)? {
            let locked = self.identity.record_failed_access(&mut user).await?;
            self.login_failed(Some(&user.id), client, "Invalid password".to_string()).await;
            if locked {
                self.on_locked_out(&user, client).await;
            }
            return Err(OperationError::invalid_credentials());
        }

        self.identity.record_sign_in(&mut user).await?;
        let response = self.issue_tokens(user, client.ip()).await?;

        counter!("gestmantia_logins_total", "outcome" => "success").increment(1);
        info!(user_id = %response.user.id, "User signed in");
        self.security
            .log_event(
                SecurityLog::new(events::LOGIN_SUCCEEDED, "Signed in", true)
                    .for_user(Some(&response.user.id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        Ok(response)
    }

    /// Self-service sign-up: an active user with the default role, signed in.
    pub async fn register(&self, req: RegisterRequest, client: &ClientInfo) -> OperationResult<AuthResponse> {
        let created = self
            .user_service
            .create_user(
                CreateUserRequest {
                    user_name: req.user_name,
                    email: req.email,
                    password: req.password,
                    confirm_password: Some(req.confirm_password),
                    first_name: req.first_name,
                    last_name: req.last_name,
                    phone_number: None,
                    roles: Vec::new(),
                },
                None,
            )
            .await?;

        let user = self
            .users
            .find_active_by_id(&created.id)
            .await?
            .ok_or_else(|| OperationError::failed("Registered user could not be loaded"))?;

        self.security
            .log_event(
                SecurityLog::new(events::USER_REGISTERED, format!("User {} registered", user.user_name), true)
                    .for_user(Some(&user.id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;

        self.issue_tokens(user, client.ip()).await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, raw_token: &str, client: &ClientInfo) -> OperationResult<AuthResponse> {
        if raw_token.trim().is_empty() {
            return Err(OperationError::invalid_field("refreshToken", "Refresh token is required"));
        }

        let hash = RefreshToken::hash_token(raw_token.trim());
        let Some(current) = self.refresh_tokens.find_by_hash(&hash).await? else {
            return Err(OperationError::unauthorized("INVALID_TOKEN", "Invalid refresh token"));
        };

        if current.is_revoked() {
            self.on_token_reuse(&current, client).await?;
            return Err(OperationError::unauthorized("INVALID_TOKEN", "Refresh token has been revoked"));
        }
        if current.is_expired() {
            return Err(OperationError::unauthorized("TOKEN_EXPIRED", "Refresh token has expired"));
        }

        let user = self
            .users
            .find_active_by_id(&current.user_id)
            .await?
            .filter(|u| self.identity.sign_in_state(u) == SignInState::Allowed)
            .ok_or_else(|| OperationError::unauthorized("INVALID_TOKEN", "Account cannot sign in"))?;

        // Claims are read before the transaction takes the connection
        let (roles, permissions) = self.identity.token_claims(&user.id).await?;
        let access = self.tokens.generate_access_token(&user, roles.clone(), permissions)?;

        let (raw, successor) = RefreshToken::generate_token_pair(&user.id, self.tokens.refresh_token_expiry());
        let successor = successor.with_ip(client.ip_address.clone());

        // Only one concurrent caller can claim the token
        let mut uow = UnitOfWork::begin(self.refresh_tokens.pool()).await?;
        let claimed = self
            .refresh_tokens
            .revoke_if_active_with(uow.conn(), &current.id, client.ip(), REASON_REPLACED, Some(&successor.token_hash))
            .await?;
        if !claimed {
            uow.rollback().await?;
            self.on_token_reuse(&current, client).await?;
            return Err(OperationError::unauthorized("INVALID_TOKEN", "Refresh token has been revoked"));
        }
        self.refresh_tokens.add_with(uow.conn(), &successor).await?;
        uow.commit().await?;

        info!(user_id = %user.id, "Refresh token rotated");
        self.security
            .log_event(
                SecurityLog::new(events::TOKEN_REFRESHED, "Refresh token rotated", true)
                    .for_user(Some(&user.id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;

        Ok(self.auth_response(user, roles, access, raw))
    }

    /// Revoke a live refresh token without issuing a replacement (logout).
    pub async fn revoke(&self, raw_token: &str, client: &ClientInfo) -> OperationResult<()> {
        if raw_token.trim().is_empty() {
            return Err(OperationError::invalid_field("refreshToken", "Refresh token is required"));
        }

        let hash = RefreshToken::hash_token(raw_token.trim());
        let mut token = self
            .refresh_tokens
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| OperationError::not_found("RefreshToken", "presented token"))?;

        if !token.is_active() {
            return Err(OperationError::invalid_field("refreshToken", "Token is already revoked or expired"));
        }

        token.revoke(client.ip(), REASON_LOGOUT, None);
        self.refresh_tokens.update(&token).await?;

        info!(user_id = %token.user_id, "Refresh token revoked");
        self.security
            .log_event(
                SecurityLog::new(events::TOKEN_REVOKED, "Refresh token revoked", true)
                    .for_user(Some(&token.user_id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        Ok(())
    }

    /// Always succeeds for a well-formed email so callers cannot discover
    /// accounts. A known active user is sent a reset token.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest, client: &ClientInfo) -> OperationResult<()> {
        Validator::new()
            .required("email", &req.email)
            .email("email", &req.email)
            .finish()?;

        let user = self
            .users
            .find_by_email(&req.email)
            .await?
            .filter(|u| u.is_active);
        let Some(user) = user else {
            info!("Password reset requested for an unknown or inactive email");
            return Ok(());
        };

        let token = match self.tokens.generate_password_reset_token(&user) {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, user_id = %user.id, "Failed to issue password reset token");
                return Ok(());
            }
        };

        let link = format!(
            "{}/reset-password?token={}",
            self.frontend_base_url.trim_end_matches('/'),
            token
        );
        let message = EmailMessage {
            to: user.email.clone(),
            subject: "Reset your GestMantIA password".to_string(),
            body: format!(
                "Hello {},\n\nUse the link below to choose a new password:\n{}\n\nReset token: {}\n\nIf you did not ask for this, ignore this email.\n",
                user.full_name(),
                link,
                token
            ),
        };
        if let Err(e) = self.email.send(message).await {
            warn!(error = %e, user_id = %user.id, "Password reset email could not be sent");
        }

        self.security
            .log_event(
                SecurityLog::new(events::PASSWORD_RESET_REQUESTED, "Password reset requested", true)
                    .for_user(Some(&user.id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        Ok(())
    }

    /// Set a new password with a reset token. Rotating the security stamp
    /// invalidates every other reset token issued for the user.
    pub async fn reset_password(&self, req: ResetPasswordRequest, client: &ClientInfo) -> OperationResult<()> {
        Validator::new()
            .required("email", &req.email)
            .required("token", &req.token)
            .required("newPassword", &req.new_password)
            .matches("confirmPassword", &req.confirm_password, &req.new_password)
            .finish()?;

        let invalid_token = || OperationError::invalid_field("token", "Invalid or expired password reset token");

        let claims = self
            .tokens
            .validate_password_reset_token(req.token.trim())
            .map_err(|_| invalid_token())?;
        let mut user = self
            .users
            .find_by_email(&req.email)
            .await?
            .filter(|u| u.id == claims.sub && u.security_stamp == claims.stamp)
            .ok_or_else(invalid_token)?;

        self.identity.set_password(&mut user, "newPassword", &req.new_password)?;
        user.unlock();

        let mut uow = UnitOfWork::begin(self.users.pool()).await?;
        self.users.update_with(uow.conn(), &user).await?;
        self.refresh_tokens
            .revoke_all_for_user_with(uow.conn(), &user.id, client.ip(), REASON_PASSWORD_CHANGED)
            .await?;
        uow.commit().await?;

        info!(user_id = %user.id, "Password reset");
        self.security
            .log_event(
                SecurityLog::new(events::PASSWORD_RESET, "Password reset with token", true)
                    .for_user(Some(&user.id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        self.security
            .notify(&user.id, "Password reset", "Your password was reset. All sessions were signed out.")
            .await;
        Ok(())
    }

    async fn issue_tokens(&self, user: User, ip: Option<&str>) -> OperationResult<AuthResponse> {
        let (roles, permissions) = self.identity.token_claims(&user.id).await?;
        let access = self.tokens.generate_access_token(&user, roles.clone(), permissions)?;

        let (raw, refresh) = RefreshToken::generate_token_pair(&user.id, self.tokens.refresh_token_expiry());
        let refresh = refresh.with_ip(ip.map(String::from));
        self.refresh_tokens.add(&refresh).await?;

        Ok(self.auth_response(user, roles, access, raw))
    }

    fn auth_response(&self, user: User, roles: Vec<String>, access: IssuedToken, refresh_token: String) -> AuthResponse {
        AuthResponse {
            access_token: access.token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.tokens.config().access_token_expiry.num_seconds(),
            expires_at: access.expires_at,
            user: UserResponse::from(user).with_roles(roles),
        }
    }

    async fn login_failed(&self, user_id: Option<&str>, client: &ClientInfo, description: String) {
        counter!("gestmantia_logins_total", "outcome" => "failure").increment(1);
        info!(user_id = ?user_id, ip = ?client.ip(), "{}", description);
        self.security
            .log_event(
                SecurityLog::new(events::LOGIN_FAILED, description, false)
                    .for_user(user_id)
                    .with_client(client.ip(), client.agent()),
            )
            .await;
    }

    async fn on_locked_out(&self, user: &User, client: &ClientInfo) {
        let message = format!("Account {} locked after repeated failed sign-ins", user.user_name);
        self.security
            .log_event(
                SecurityLog::new(events::ACCOUNT_LOCKED, &message, true)
                    .for_user(Some(&user.id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        self.security
            .raise_alert(SecurityAlert::new(events::ACCOUNT_LOCKED, AlertSeverity::High, message).for_user(Some(&user.id)))
            .await;
        self.security
            .notify(
                &user.id,
                "Account locked",
                "Your account was locked after too many failed sign-in attempts.",
            )
            .await;
    }

    async fn on_token_reuse(&self, token: &RefreshToken, client: &ClientInfo) -> OperationResult<()> {
        let revoked = self
            .refresh_tokens
            .revoke_all_for_user(&token.user_id, client.ip(), REASON_REUSE)
            .await?;

        warn!(user_id = %token.user_id, revoked, ip = ?client.ip(), "Revoked refresh token presented again");
        counter!("gestmantia_token_reuse_total").increment(1);

        let message = format!(
            "Revoked refresh token reused; {} active token(s) of the user were revoked",
            revoked
        );
        self.security
            .log_event(
                SecurityLog::new(events::TOKEN_REUSE_DETECTED, &message, false)
                    .for_user(Some(&token.user_id))
                    .with_client(client.ip(), client.agent()),
            )
            .await;
        self.security
            .raise_alert(
                SecurityAlert::new(events::TOKEN_REUSE_DETECTED, AlertSeverity::Critical, message)
                    .for_user(Some(&token.user_id)),
            )
            .await;
        Ok(())
    }
}
