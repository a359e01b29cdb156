//! Permission Repository

use std::ops::Deref;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::entity::Permission;
use crate::shared::error::Result;
use crate::shared::repository::{Criteria, Repository};

pub struct PermissionRepository {
    repo: Repository<Permission>,
}

impl Deref for PermissionRepository {
    type Target = Repository<Permission>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

impl PermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { repo: Repository::new(pool) }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Permission>> {
        self.repo.find_one(&Criteria::new().eq("name", name.trim())).await
    }

    /// Names are unique across live and soft-deleted rows.
    pub async fn name_taken(&self, name: &str) -> Result<bool> {
        self.repo
            .any(&Criteria::new().eq("name", name.trim()).include_deleted())
            .await
    }

    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Permission>> {
        let mut criteria = Criteria::new();
        if let Some(category) = category {
            criteria = criteria.eq("category", category);
        }
        self.repo
            .list_by(&criteria.order_by("name", false))
            .await
    }

    /// Live permissions whose names are in `names`.
    pub async fn find_by_names(&self, names: &[String]) -> Result<Vec<Permission>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT * FROM identity_permissions WHERE is_deleted = 0 AND name IN (",
        );
        let mut separated = qb.separated(", ");
        for name in names {
            separated.push_bind(name.trim().to_string());
        }
        separated.push_unseparated(")");

        let rows = qb
            .build_query_as::<Permission>()
            .fetch_all(self.repo.pool())
            .await?;
        Ok(rows)
    }
}
