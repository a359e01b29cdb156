//! Permission Entity
//!
//! A named capability (e.g. `users.write`) granted to roles. Each permission
//! is also exposed as a claim of type `permission` whose value is its name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::shared::repository::{Entity, SqliteQuery};
use crate::TsidGenerator;

pub const PERMISSION_CLAIM_TYPE: &str = "permission";

/// Built-in permission names
pub mod permissions {
    pub const USERS_READ: &str = "users.read";
    pub const USERS_WRITE: &str = "users.write";
    pub const ROLES_READ: &str = "roles.read";
    pub const ROLES_WRITE: &str = "roles.write";
    pub const PERMISSIONS_READ: &str = "permissions.read";
    pub const PERMISSIONS_WRITE: &str = "permissions.write";
    pub const SECURITY_READ: &str = "security.read";
    pub const SECURITY_WRITE: &str = "security.write";

    /// Grants everything
    pub const ALL: &str = "*";

    /// (name, category, description)
    pub const BUILT_IN: &[(&str, &str, &str)] = &[
        (USERS_READ, "Users", "View users"),
        (USERS_WRITE, "Users", "Create, update, lock and delete users"),
        (ROLES_READ, "Roles", "View roles"),
        (ROLES_WRITE, "Roles", "Create, update and delete roles"),
        (PERMISSIONS_READ, "Permissions", "View permissions"),
        (PERMISSIONS_WRITE, "Permissions", "Create and delete permissions"),
        (SECURITY_READ, "Security", "View security logs and alerts"),
        (SECURITY_WRITE, "Security", "Resolve security alerts"),
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub claim_type: String,
    pub claim_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Permission {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        Self {
            id: TsidGenerator::generate(),
            claim_type: PERMISSION_CLAIM_TYPE.to_string(),
            claim_value: name.clone(),
            name,
            description: None,
            category: None,
            created_at: Utc::now(),
            updated_at: None,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

impl Entity for Permission {
    const TABLE: &'static str = "identity_permissions";
    const NAME: &'static str = "Permission";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "description",
        "category",
        "claim_type",
        "claim_value",
        "created_at",
        "updated_at",
        "is_deleted",
        "deleted_at",
    ];
    const SOFT_DELETE: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.name)
            .bind(&self.description)
            .bind(&self.category)
            .bind(&self.claim_type)
            .bind(&self.claim_value)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.is_deleted)
            .bind(self.deleted_at)
    }
}
