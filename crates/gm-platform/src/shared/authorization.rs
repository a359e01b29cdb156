//! Authorization
//!
//! `AuthContext` is the authenticated caller with its roles and resolved
//! permissions. `PolicyMap` maps policy names to declarative requirements;
//! handlers call `policies.require(POLICY, &auth)` before doing work.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::auth::identity::{Authenticatable, IdentityManager, SignInState};
use crate::auth::token_service::AccessTokenClaims;
use crate::permission::entity::{permissions, PERMISSION_CLAIM_TYPE};
use crate::role::entity::roles;
use crate::role::repository::RolePermissionRepository;
use crate::user::repository::{UserRepository, UserRoleRepository};
use crate::shared::error::{PlatformError, Result};
use crate::user::entity::User;

/// Policy names
pub mod policies {
    pub const AUTHENTICATED: &str = "authenticated";
    pub const ADMIN_ONLY: &str = "admin";
    pub const USERS_READ: &str = "users.read";
    pub const USERS_WRITE: &str = "users.write";
    pub const ROLES_READ: &str = "roles.read";
    pub const ROLES_WRITE: &str = "roles.write";
    pub const PERMISSIONS_READ: &str = "permissions.read";
    pub const PERMISSIONS_WRITE: &str = "permissions.write";
    pub const SECURITY_READ: &str = "security.read";
    pub const SECURITY_WRITE: &str = "security.write";
}

/// Authorization context for a request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub user_name: String,
    pub email: String,
    pub roles: Vec<String>,
    /// All permissions (resolved from roles)
    pub permissions: HashSet<String>,
}

impl AuthContext {
    /// Context for a stored user with its current roles and permissions.
    pub fn for_user(user: &User, roles: Vec<String>, permissions: HashSet<String>) -> Self {
        Self {
            user_id: user.id.clone(),
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            roles,
            permissions,
        }
    }

    /// Role names compare case-insensitively.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }

    /// Exact match, `resource.*` wildcard, or the `*` superuser grant.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.permissions.contains(permission) || self.permissions.contains(permissions::ALL) {
            return true;
        }

        match permission.split_once('.') {
            Some((resource, _)) => self.permissions.contains(&format!("{}.*", resource)),
            None => false,
        }
    }

    /// Claims carried by the caller: its permissions and roles.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        match claim_type {
            PERMISSION_CLAIM_TYPE => self.has_permission(value),
            "role" => self.has_role(value),
            "sub" => self.user_id == value,
            "name" => self.user_name == value,
            "email" => self.email.eq_ignore_ascii_case(value),
            _ => false,
        }
    }
}

/// Declarative authorization requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    /// Caller holds at least one of the roles
    AnyRole(Vec<String>),
    Permission(String),
    Claim { claim_type: String, value: String },
    /// Satisfied when any inner requirement is
    AnyOf(Vec<Requirement>),
}

impl Requirement {
    pub fn role(role: &str) -> Self {
        Self::AnyRole(vec![role.to_string()])
    }

    pub fn permission(name: &str) -> Self {
        Self::Permission(name.to_string())
    }

    pub fn is_satisfied_by(&self, ctx: &AuthContext) -> bool {
        match self {
            Self::Authenticated => !ctx.user_id.is_empty(),
            Self::AnyRole(roles) => ctx.has_any_role(roles),
            Self::Permission(name) => ctx.has_permission(name),
            Self::Claim { claim_type, value } => ctx.has_claim(claim_type, value),
            Self::AnyOf(inner) => inner.iter().any(|r| r.is_satisfied_by(ctx)),
        }
    }
}

/// Named policies
#[derive(Debug, Clone, Default)]
pub struct PolicyMap {
    policies: HashMap<String, Requirement>,
}

impl PolicyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in policies: each permission policy is met by the Admin role or
    /// by holding the permission of the same name.
    pub fn defaults() -> Self {
        let mut map = Self::new()
            .with(policies::AUTHENTICATED, Requirement::Authenticated)
            .with(policies::ADMIN_ONLY, Requirement::role(roles::ADMIN));

        for name in [
            policies::USERS_READ,
            policies::USERS_WRITE,
            policies::ROLES_READ,
            policies::ROLES_WRITE,
            policies::PERMISSIONS_READ,
            policies::PERMISSIONS_WRITE,
            policies::SECURITY_READ,
            policies::SECURITY_WRITE,
        ] {
            map = map.with(
                name,
                Requirement::AnyOf(vec![Requirement::role(roles::ADMIN), Requirement::permission(name)]),
            );
        }
        map
    }

    pub fn with(mut self, name: &str, requirement: Requirement) -> Self {
        self.policies.insert(name.to_string(), requirement);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Requirement> {
        self.policies.get(name)
    }

    /// Unknown policies are never satisfied.
    pub fn evaluate(&self, policy: &str, ctx: &AuthContext) -> bool {
        self.policies
            .get(policy)
            .is_some_and(|requirement| requirement.is_satisfied_by(ctx))
    }

    pub fn require(&self, policy: &str, ctx: &AuthContext) -> Result<()> {
        if self.evaluate(policy, ctx) {
            Ok(())
        } else {
            Err(PlatformError::forbidden(format!("Policy '{}' is not satisfied", policy)))
        }
    }
}

/// Resolves request authorization contexts
pub struct AuthorizationService {
    users: Arc<UserRepository>,
    user_roles: Arc<UserRoleRepository>,
    role_permissions: Arc<RolePermissionRepository>,
    identity: Arc<IdentityManager>,
}

impl AuthorizationService {
    pub fn new(
        users: Arc<UserRepository>,
        user_roles: Arc<UserRoleRepository>,
        role_permissions: Arc<RolePermissionRepository>,
        identity: Arc<IdentityManager>,
    ) -> Self {
        Self {
            users,
            user_roles,
            role_permissions,
            identity,
        }
    }

    /// Build the context for a validated access token.
    ///
    /// The subject must still be able to sign in. Roles and permissions come
    /// from the current assignments, not from the token.
    pub async fn build_context(&self, claims: &AccessTokenClaims) -> Result<AuthContext> {
        let user = self
            .users
            .get_by_id(&claims.sub)
            .await?
            .ok_or_else(|| PlatformError::unauthorized("Account no longer exists"))?;

        let state = self.identity.sign_in_state(&user);
        if state != SignInState::Allowed {
            debug!(user_id = %user.id, state = state.as_str(), "Access token of a disabled account");
            return Err(PlatformError::unauthorized("Account cannot sign in"));
        }

        let roles = self.user_roles.role_names_for_user(&user.id).await?;
        let permissions = self.role_permissions.permission_names_for_roles(&roles).await?;
        Ok(AuthContext::for_user(&user, roles, permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(roles: &[&str], perms: &[&str]) -> AuthContext {
        AuthContext {
            user_id: "U1".into(),
            user_name: "planner".into(),
            email: "planner@plant.example".into(),
            roles: roles.iter().map(|s| s.to_string()).collect(),
            permissions: perms.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_admin_role_satisfies_every_default_policy() {
        let map = PolicyMap::defaults();
        let admin = ctx(&["admin"], &[]);
        assert!(map.evaluate(policies::USERS_WRITE, &admin));
        assert!(map.evaluate(policies::SECURITY_READ, &admin));
        assert!(map.evaluate(policies::ADMIN_ONLY, &admin));
    }

    #[test]
    fn test_permission_policies() {
        let map = PolicyMap::defaults();
        let reader = ctx(&["User"], &["users.read"]);
        assert!(map.evaluate(policies::USERS_READ, &reader));
        assert!(!map.evaluate(policies::USERS_WRITE, &reader));
        assert!(map.require(policies::ROLES_READ, &reader).is_err());
        assert!(map.evaluate(policies::AUTHENTICATED, &reader));
    }

    #[test]
    fn test_wildcards() {
        let c = ctx(&[], &["roles.*"]);
        assert!(c.has_permission("roles.write"));
        assert!(!c.has_permission("users.read"));
        assert!(ctx(&[], &["*"]).has_permission("anything.at.all"));
    }

    #[test]
    fn test_claim_requirement() {
        let map = PolicyMap::new().with(
            "own-mailbox",
            Requirement::Claim { claim_type: "email".into(), value: "PLANNER@plant.example".into() },
        );
        assert!(map.evaluate("own-mailbox", &ctx(&[], &[])));
        assert!(!map.evaluate("missing-policy", &ctx(&["Admin"], &[])));
    }
}
