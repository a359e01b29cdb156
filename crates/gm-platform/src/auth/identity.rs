//! Identity capabilities
//!
//! `Authenticatable` covers what sign-in needs from a user store: lookup,
//! password check, lockout state and failed-attempt bookkeeping.
//! `RoleAssignable` covers role membership and the permissions it grants.
//! `IdentityManager` implements both over the SQLite repositories and the
//! Argon2 password service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info};

use super::password_service::PasswordService;
use crate::role::entity::Role;
use crate::role::repository::RolePermissionRepository;
use crate::shared::error::Result;
use crate::user::entity::User;
use crate::user::repository::{UserRepository, UserRoleRepository};

/// Whether a found user may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInState {
    Allowed,
    Deleted,
    Inactive,
    LockedOut,
}

impl SignInState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Deleted => "deleted",
            Self::Inactive => "inactive",
            Self::LockedOut => "locked out",
        }
    }
}

/// Failed sign-ins allowed before a lock, and how long the lock lasts.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_access_attempts: i32,
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_access_attempts: 5,
            lockout_duration: Duration::minutes(15),
        }
    }
}

impl From<&gm_config::SecurityConfig> for LockoutPolicy {
    fn from(config: &gm_config::SecurityConfig) -> Self {
        Self {
            max_failed_access_attempts: config.max_failed_access_attempts,
            lockout_duration: Duration::minutes(config.lockout_minutes),
        }
    }
}

#[async_trait]
pub trait Authenticatable: Send + Sync {
    /// Look a user up by user name, then by email. Soft-deleted users are
    /// not returned.
    async fn find_for_sign_in(&self, identifier: &str) -> Result<Option<User>>;

    fn sign_in_state(&self, user: &User) -> SignInState;

    fn check_password(&self, user: &User, password: &str) -> Result<bool>;

    /// Count a failed attempt and persist it. Returns true when it locked
    /// the account.
    async fn record_failed_access(&self, user: &mut User) -> Result<bool>;

    /// Reset the failure count, stamp the login time and persist.
    async fn record_sign_in(&self, user: &mut User) -> Result<()>;

    /// Policy-check and hash `password` onto `user`, rotating its security
    /// stamp. Does not persist. Policy failures are reported under `field`.
    fn set_password(&self, user: &mut User, field: &str, password: &str) -> Result<()>;
}

#[async_trait]
pub trait RoleAssignable: Send + Sync {
    async fn roles_of(&self, user_id: &str) -> Result<Vec<Role>>;

    async fn role_names(&self, user_id: &str) -> Result<Vec<String>>;

    async fn add_to_role(&self, user_id: &str, role: &Role, assigned_by: Option<&str>) -> Result<()>;

    async fn remove_from_role(&self, user_id: &str, role: &Role) -> Result<bool>;

    /// Sorted names of the permissions granted to the named roles.
    async fn permissions_of(&self, role_names: &[String]) -> Result<Vec<String>>;
}

pub struct IdentityManager {
    users: Arc<UserRepository>,
    user_roles: Arc<UserRoleRepository>,
    role_permissions: Arc<RolePermissionRepository>,
    passwords: Arc<PasswordService>,
    lockout: LockoutPolicy,
}

impl IdentityManager {
    pub fn new(
        users: Arc<UserRepository>,
        user_roles: Arc<UserRoleRepository>,
        role_permissions: Arc<RolePermissionRepository>,
        passwords: Arc<PasswordService>,
        lockout: LockoutPolicy,
    ) -> Self {
        Self {
            users,
            user_roles,
            role_permissions,
            passwords,
            lockout,
        }
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    /// Roles and permissions to embed in an access token.
    pub async fn token_claims(&self, user_id: &str) -> Result<(Vec<String>, Vec<String>)> {
        let roles = self.role_names(user_id).await?;
        let permissions = self.permissions_of(&roles).await?;
        Ok((roles, permissions))
    }
}

#[async_trait]
impl Authenticatable for IdentityManager {
    async fn find_for_sign_in(&self, identifier: &str) -> Result<Option<User>> {
        self.users.find_by_user_name_or_email(identifier).await
    }

    fn sign_in_state(&self, user: &User) -> SignInState {
        if user.is_deleted {
            SignInState::Deleted
        } else if !user.is_active {
            SignInState::Inactive
        } else if user.is_locked_out(Utc::now()) {
            SignInState::LockedOut
        } else {
            SignInState::Allowed
        }
    }

    fn check_password(&self, user: &User, password: &str) -> Result<bool> {
        self.passwords.verify_password(password, &user.password_hash)
    }

    async fn record_failed_access(&self, user: &mut User) -> Result<bool> {
        let locked = user.record_failed_access(
            self.lockout.max_failed_access_attempts,
            self.lockout.lockout_duration,
        );
        self.users.update(user).await?;

        if locked {
            info!(user_id = %user.id, until = ?user.lockout_end, "User locked after failed sign-ins");
        } else {
            debug!(user_id = %user.id, failures = user.access_failed_count, "Failed sign-in recorded");
        }
        Ok(locked)
    }

    async fn record_sign_in(&self, user: &mut User) -> Result<()> {
        user.mark_login();
        self.users.update(user).await
    }

    fn set_password(&self, user: &mut User, field: &str, password: &str) -> Result<()> {
        self.passwords.validate_password(field, password)?;
        let hash = self.passwords.hash_unchecked(password)?;
        user.set_password_hash(hash);
        Ok(())
    }
}

#[async_trait]
impl RoleAssignable for IdentityManager {
    async fn roles_of(&self, user_id: &str) -> Result<Vec<Role>> {
        self.user_roles.roles_for_user(user_id).await
    }

    async fn role_names(&self, user_id: &str) -> Result<Vec<String>> {
        self.user_roles.role_names_for_user(user_id).await
    }

    async fn add_to_role(&self, user_id: &str, role: &Role, assigned_by: Option<&str>) -> Result<()> {
        self.user_roles.assign(user_id, &role.id, assigned_by).await
    }

    async fn remove_from_role(&self, user_id: &str, role: &Role) -> Result<bool> {
        self.user_roles.remove(user_id, &role.id).await
    }

    async fn permissions_of(&self, role_names: &[String]) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .role_permissions
            .permission_names_for_roles(role_names)
            .await?
            .into_iter()
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password_service::{Argon2Config, PasswordPolicy};
    use crate::db::connect_in_memory;
    use crate::role::repository::RoleRepository;

    async fn manager() -> (IdentityManager, Arc<UserRepository>, RoleRepository) {
        let pool = connect_in_memory().await.unwrap();
        let users = Arc::new(UserRepository::new(pool.clone()));
        let manager = IdentityManager::new(
            users.clone(),
            Arc::new(UserRoleRepository::new(pool.clone())),
            Arc::new(RolePermissionRepository::new(pool.clone())),
            Arc::new(PasswordService::new(Argon2Config::testing(), PasswordPolicy::default())),
            LockoutPolicy {
                max_failed_access_attempts: 3,
                lockout_duration: Duration::minutes(10),
            },
        );
        (manager, users, RoleRepository::new(pool))
    }

    #[tokio::test]
    async fn test_failed_attempts_lock_at_threshold() {
        let (manager, users, _) = manager().await;
        let mut user = User::new("op.night", "op.night@plant.example", "x");
        manager.set_password(&mut user, "password", "Night-shift1").unwrap();
        users.add(&user).await.unwrap();

        assert!(manager.check_password(&user, "Night-shift1").unwrap());
        assert!(!manager.record_failed_access(&mut user).await.unwrap());
        assert!(!manager.record_failed_access(&mut user).await.unwrap());
        assert!(manager.record_failed_access(&mut user).await.unwrap());

        let stored = users.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(manager.sign_in_state(&stored), SignInState::LockedOut);
        assert_eq!(stored.access_failed_count, 0);
    }

    #[tokio::test]
    async fn test_set_password_enforces_policy_and_rotates_stamp() {
        let (manager, _, _) = manager().await;
        let mut user = User::new("op.day", "op.day@plant.example", "x");
        let stamp = user.security_stamp.clone();

        assert!(manager.set_password(&mut user, "newPassword", "short").is_err());
        assert_eq!(user.security_stamp, stamp);

        manager.set_password(&mut user, "newPassword", "Day-shift22").unwrap();
        assert_ne!(user.security_stamp, stamp);
    }

    #[tokio::test]
    async fn test_role_membership() {
        let (manager, users, roles) = manager().await;
        let user = User::new("planner", "planner@plant.example", "x");
        users.add(&user).await.unwrap();
        let role = Role::new("Planner");
        roles.add(&role).await.unwrap();

        manager.add_to_role(&user.id, &role, None).await.unwrap();
        manager.add_to_role(&user.id, &role, None).await.unwrap();
        assert_eq!(manager.role_names(&user.id).await.unwrap(), vec!["Planner".to_string()]);

        assert!(manager.remove_from_role(&user.id, &role).await.unwrap());
        assert!(manager.roles_of(&user.id).await.unwrap().is_empty());
    }
}
