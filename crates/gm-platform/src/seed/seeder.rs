//! Data Seeder
//!
//! Seeds the system roles, the built-in permissions and the initial
//! administrator on startup. Every step checks for existing rows first, so
//! running it against a populated database changes nothing.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::auth::password_service::PasswordService;
use crate::permission::entity::{permissions, Permission};
use crate::permission::repository::PermissionRepository;
use crate::role::entity::{roles, Role};
use crate::role::repository::{RolePermissionRepository, RoleRepository};
use crate::shared::error::Result;
use crate::user::entity::User;
use crate::user::repository::{UserRepository, UserRoleRepository};

/// What a seeding run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub permissions_created: usize,
    pub admin_created: bool,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.roles_created == 0 && self.permissions_created == 0 && !self.admin_created
    }
}

pub struct DataSeeder {
    roles: RoleRepository,
    role_permissions: RolePermissionRepository,
    permissions: PermissionRepository,
    users: UserRepository,
    user_roles: UserRoleRepository,
    passwords: Arc<PasswordService>,
    config: gm_config::SeedConfig,
}

impl DataSeeder {
    pub fn new(pool: SqlitePool, passwords: Arc<PasswordService>, config: gm_config::SeedConfig) -> Self {
        Self {
            roles: RoleRepository::new(pool.clone()),
            role_permissions: RolePermissionRepository::new(pool.clone()),
            permissions: PermissionRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            user_roles: UserRoleRepository::new(pool),
            passwords,
            config,
        }
    }

    pub async fn seed(&self) -> Result<SeedReport> {
        let mut report = SeedReport::default();
        if !self.config.enabled {
            info!("Seeding disabled");
            return Ok(report);
        }

        let admin = self
            .ensure_role(roles::ADMIN, "Full administrative access", &mut report)
            .await?;
        self.ensure_role(roles::USER, "Standard user", &mut report).await?;

        for (name, category, description) in permissions::BUILT_IN {
            if let Some(permission) = self.ensure_permission(name, category, description, &mut report).await? {
                self.role_permissions.grant(&admin.id, &permission.id, None).await?;
            }
        }

        self.ensure_admin_user(&admin, &mut report).await?;

        if report.is_empty() {
            info!("Seed data already present");
        } else {
            info!(
                roles = report.roles_created,
                permissions = report.permissions_created,
                admin = report.admin_created,
                "Seed data created"
            );
        }
        Ok(report)
    }

    async fn ensure_role(&self, name: &str, description: &str, report: &mut SeedReport) -> Result<Role> {
        if let Some(existing) = self.roles.find_by_name(name).await? {
            return Ok(existing);
        }

        let role = Role::new(name).with_description(description).system();
        self.roles.add(&role).await?;
        report.roles_created += 1;
        info!(role = %role.name, "Created system role");
        Ok(role)
    }

    /// `None` when an administrator has deleted the permission; it stays deleted.
    async fn ensure_permission(
        &self,
        name: &str,
        category: &str,
        description: &str,
        report: &mut SeedReport,
    ) -> Result<Option<Permission>> {
        if let Some(existing) = self.permissions.find_by_name(name).await? {
            return Ok(Some(existing));
        }
        if self.permissions.name_taken(name).await? {
            return Ok(None);
        }

        let permission = Permission::new(name)
            .with_category(category)
            .with_description(description);
        self.permissions.add(&permission).await?;
        report.permissions_created += 1;
        Ok(Some(permission))
    }

    async fn ensure_admin_user(&self, admin: &Role, report: &mut SeedReport) -> Result<()> {
        let user_name = self.config.admin_user_name.trim();
        if self.users.user_name_taken(user_name, None).await?
            || self.users.email_taken(&self.config.admin_email, None).await?
        {
            return Ok(());
        }

        let hash = self.passwords.hash_unchecked(&self.config.admin_password)?;
        let mut user = User::new(user_name, &self.config.admin_email, hash)
            .with_names(Some("System".to_string()), Some("Administrator".to_string()));
        user.email_confirmed = true;

        self.users.add(&user).await?;
        self.user_roles.assign(&user.id, &admin.id, None).await?;
        report.admin_created = true;
        info!(user_name = %user.user_name, email = %user.email, "Created administrator account");
        Ok(())
    }
}
