//! Role Entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::shared::repository::{Entity, SqliteQuery};
use crate::shared::validation::normalize;
use crate::TsidGenerator;

/// Built-in role names
pub mod roles {
    pub const ADMIN: &str = "Admin";
    pub const USER: &str = "User";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub description: Option<String>,
    /// System roles are seeded and cannot be deleted
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        Self {
            id: TsidGenerator::generate(),
            normalized_name: normalize(&name),
            name,
            description: None,
            is_system: false,
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

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.normalized_name = normalize(name);
        self.updated_at = Some(Utc::now());
    }
}

impl Entity for Role {
    const TABLE: &'static str = "identity_roles";
    const NAME: &'static str = "Role";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "normalized_name",
        "description",
        "is_system",
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
            .bind(&self.normalized_name)
            .bind(&self.description)
            .bind(self.is_system)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.is_deleted)
            .bind(self.deleted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_normalizes() {
        let mut role = Role::new("Planner");
        assert_eq!(role.normalized_name, "PLANNER");
        role.rename(" Lead Planner ");
        assert_eq!(role.name, "Lead Planner");
        assert_eq!(role.normalized_name, "LEAD PLANNER");
        assert!(role.updated_at.is_some());
    }
}
