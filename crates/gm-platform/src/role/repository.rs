//! Role and role-permission repositories.

use std::collections::HashSet;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::entity::Role;
use crate::permission::entity::Permission;
use crate::shared::error::Result;
use crate::shared::repository::{Criteria, Repository};
use crate::shared::validation::normalize;

pub struct RoleRepository {
    repo: Repository<Role>,
}

impl Deref for RoleRepository {
    type Target = Repository<Role>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

impl RoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { repo: Repository::new(pool) }
    }

    pub async fn find_active_by_id(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.repo.get_by_id(id).await?.filter(|r| !r.is_deleted))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.repo
            .find_one(&Criteria::new().eq("normalized_name", normalize(name)))
            .await
    }

    pub async fn name_taken(&self, name: &str, except_id: Option<&str>) -> Result<bool> {
        let found = self
            .repo
            .list_by(
                &Criteria::new()
                    .eq("normalized_name", normalize(name))
                    .include_deleted()
                    .limit(2),
            )
            .await?;
        Ok(found.iter().any(|r| Some(r.id.as_str()) != except_id))
    }

    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Role>> {
        let mut criteria = Criteria::new();
        if let Some(term) = search {
            criteria = criteria.contains(&["name", "description"], term);
        }
        self.repo.list_by(&criteria.order_by("name", false)).await
    }

    /// Live roles matching any of `names` (case-insensitive).
    pub async fn find_by_names(&self, names: &[String]) -> Result<Vec<Role>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT * FROM identity_roles WHERE is_deleted = 0 AND normalized_name IN (",
        );
        let mut separated = qb.separated(", ");
        for name in names {
            separated.push_bind(normalize(name));
        }
        separated.push_unseparated(") ORDER BY name");

        let rows = qb.build_query_as::<Role>().fetch_all(self.repo.pool()).await?;
        Ok(rows)
    }
}

/// Grant of a permission to a role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    pub role_id: String,
    pub permission_id: String,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<String>,
}

pub struct RolePermissionRepository {
    pool: SqlitePool,
}

impl RolePermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_role(&self, role_id: &str) -> Result<Vec<RolePermission>> {
        let rows = sqlx::query_as::<_, RolePermission>(
            "SELECT * FROM identity_role_permissions WHERE role_id = ?",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Live permissions granted to the role, ordered by name.
    pub async fn permissions_for_role(&self, role_id: &str) -> Result<Vec<Permission>> {
        let rows = sqlx::query_as::<_, Permission>(
            "SELECT p.* FROM identity_permissions p
             JOIN identity_role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = ? AND p.is_deleted = 0
             ORDER BY p.name",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Union of permission names granted to the named roles.
    pub async fn permission_names_for_roles(&self, role_names: &[String]) -> Result<HashSet<String>> {
        if role_names.is_empty() {
            return Ok(HashSet::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT DISTINCT p.name FROM identity_permissions p
             JOIN identity_role_permissions rp ON rp.permission_id = p.id
             JOIN identity_roles r ON r.id = rp.role_id
             WHERE p.is_deleted = 0 AND r.is_deleted = 0 AND r.normalized_name IN (",
        );
        let mut separated = qb.separated(", ");
        for name in role_names {
            separated.push_bind(normalize(name));
        }
        separated.push_unseparated(")");

        let names: Vec<String> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(names.into_iter().collect())
    }

    pub async fn grant(&self, role_id: &str, permission_id: &str, assigned_by: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO identity_role_permissions (role_id, permission_id, assigned_at, assigned_by)
             VALUES (?, ?, ?, ?)",
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(Utc::now())
        .bind(assigned_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the role's grants with `permission_ids` on an open transaction.
    pub async fn replace_with(
        &self,
        conn: &mut SqliteConnection,
        role_id: &str,
        permission_ids: &[String],
        assigned_by: Option<&str>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM identity_role_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *conn)
            .await?;

        let now = Utc::now();
        for permission_id in permission_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO identity_role_permissions (role_id, permission_id, assigned_at, assigned_by)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(role_id)
            .bind(permission_id)
            .bind(now)
            .bind(assigned_by)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::permission::repository::PermissionRepository;
    use crate::shared::unit_of_work::UnitOfWork;

    #[tokio::test]
    async fn test_delete_cascades_grants() {
        let pool = connect_in_memory().await.unwrap();
        let roles = RoleRepository::new(pool.clone());
        let perms = PermissionRepository::new(pool.clone());
        let grants = RolePermissionRepository::new(pool.clone());

        let role = Role::new("Supervisor");
        roles.add(&role).await.unwrap();
        let p = Permission::new("workorders.approve");
        perms.add(&p).await.unwrap();
        grants.grant(&role.id, &p.id, None).await.unwrap();
        assert_eq!(grants.find_by_role(&role.id).await.unwrap().len(), 1);

        assert!(roles.delete(&role.id).await.unwrap());
        assert!(grants.find_by_role(&role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_resolve_names() {
        let pool = connect_in_memory().await.unwrap();
        let roles = RoleRepository::new(pool.clone());
        let perms = PermissionRepository::new(pool.clone());
        let grants = RolePermissionRepository::new(pool.clone());

        let role = Role::new("Planner");
        roles.add(&role).await.unwrap();
        let a = Permission::new("plans.read");
        let b = Permission::new("plans.write");
        perms.add(&a).await.unwrap();
        perms.add(&b).await.unwrap();

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        grants
            .replace_with(uow.conn(), &role.id, &[a.id.clone(), b.id.clone()], Some("admin"))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let names = grants.permission_names_for_roles(&["planner".into()]).await.unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("plans.write"));

        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        grants.replace_with(uow.conn(), &role.id, &[a.id.clone()], None).await.unwrap();
        uow.commit().await.unwrap();

        let listed = grants.permissions_for_role(&role.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "plans.read");
    }

    #[tokio::test]
    async fn test_name_taken_ignores_self() {
        let pool = connect_in_memory().await.unwrap();
        let roles = RoleRepository::new(pool);
        let role = Role::new("Technician");
        roles.add(&role).await.unwrap();

        assert!(roles.name_taken("TECHNICIAN", None).await.unwrap());
        assert!(!roles.name_taken("technician", Some(&role.id)).await.unwrap());
        assert_eq!(roles.find_by_names(&["technician".into()]).await.unwrap().len(), 1);
    }
}
