//! User and role-assignment repositories.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};

use super::entity::User;
use crate::role::entity::Role;
use crate::shared::error::Result;
use crate::shared::repository::{Criteria, Repository};
use crate::shared::validation::normalize;

const SEARCH_COLUMNS: &[&str] = &["user_name", "email", "first_name", "last_name"];

pub struct UserRepository {
    repo: Repository<User>,
}

impl Deref for UserRepository {
    type Target = Repository<User>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { repo: Repository::new(pool) }
    }

    /// Live (not soft-deleted) user by id.
    pub async fn find_active_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.repo.get_by_id(id).await?.filter(|u| !u.is_deleted))
    }

    pub async fn find_by_user_name(&self, user_name: &str) -> Result<Option<User>> {
        self.repo
            .find_one(&Criteria::new().eq("normalized_user_name", normalize(user_name)))
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.repo
            .find_one(&Criteria::new().eq("normalized_email", normalize(email)))
            .await
    }

    /// Sign-in lookup: the identifier may be a user name or an email.
    pub async fn find_by_user_name_or_email(&self, identifier: &str) -> Result<Option<User>> {
        if let Some(user) = self.find_by_user_name(identifier).await? {
            return Ok(Some(user));
        }
        self.find_by_email(identifier).await
    }

    /// Whether another user (any state, soft-deleted included) holds the name.
    pub async fn user_name_taken(&self, user_name: &str, except_id: Option<&str>) -> Result<bool> {
        self.taken("normalized_user_name", &normalize(user_name), except_id).await
    }

    pub async fn email_taken(&self, email: &str, except_id: Option<&str>) -> Result<bool> {
        self.taken("normalized_email", &normalize(email), except_id).await
    }

    async fn taken(&self, column: &'static str, value: &str, except_id: Option<&str>) -> Result<bool> {
        let found = self
            .repo
            .list_by(&Criteria::new().eq(column, value).include_deleted().limit(2))
            .await?;
        Ok(found.iter().any(|u| Some(u.id.as_str()) != except_id))
    }

    /// One page of live users matching `search`, plus the total match count.
    pub async fn search(&self, search: Option<&str>, page: u32, size: u32) -> Result<(Vec<User>, i64)> {
        let mut criteria = Criteria::new();
        if let Some(term) = search {
            criteria = criteria.contains(SEARCH_COLUMNS, term);
        }
        let total = self.repo.count(&criteria).await?;
        let users = self
            .repo
            .list_by(&criteria.order_by("user_name", false).page(page, size))
            .await?;
        Ok((users, total))
    }
}

/// Assignment of a role to a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    pub user_id: String,
    pub role_id: String,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<String>,
}

pub struct UserRoleRepository {
    pool: SqlitePool,
}

impl UserRoleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent: an existing assignment is left untouched.
    pub async fn assign_with<'e, X>(&self, executor: X, user_id: &str, role_id: &str, assigned_by: Option<&str>) -> Result<()>
    where
        X: SqliteExecutor<'e>,
    {
        sqlx::query(
            "INSERT OR IGNORE INTO identity_user_roles (user_id, role_id, assigned_at, assigned_by)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(role_id)
        .bind(Utc::now())
        .bind(assigned_by)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn assign(&self, user_id: &str, role_id: &str, assigned_by: Option<&str>) -> Result<()> {
        self.assign_with(&self.pool, user_id, role_id, assigned_by).await
    }

    pub async fn remove(&self, user_id: &str, role_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM identity_user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<UserRole>> {
        let rows = sqlx::query_as::<_, UserRole>(
            "SELECT * FROM identity_user_roles WHERE user_id = ? ORDER BY assigned_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Live roles assigned to the user, ordered by name.
    pub async fn roles_for_user(&self, user_id: &str) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT r.* FROM identity_roles r
             JOIN identity_user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ? AND r.is_deleted = 0
             ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    pub async fn role_names_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .roles_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    pub async fn count_users_in_role(&self, role_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM identity_user_roles WHERE role_id = ?")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_soft_deleted_hidden_from_lists_but_found_by_id() {
        let pool = connect_in_memory().await.unwrap();
        let repo = UserRepository::new(pool);

        let keep = User::new("keeper", "keeper@plant.example", "h");
        let gone = User::new("leaver", "leaver@plant.example", "h");
        repo.add(&keep).await.unwrap();
        repo.add(&gone).await.unwrap();

        assert!(repo.soft_delete(&gone.id).await.unwrap());

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, keep.id);
        assert_eq!(repo.count(&Criteria::new()).await.unwrap(), 1);

        let fetched = repo.get_by_id(&gone.id).await.unwrap().unwrap();
        assert!(fetched.is_deleted);
        assert!(repo.find_active_by_id(&gone.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_name_is_a_conflict() {
        let pool = connect_in_memory().await.unwrap();
        let repo = UserRepository::new(pool);

        repo.add(&User::new("tech", "a@plant.example", "h")).await.unwrap();
        let err = repo.add(&User::new("TECH", "b@plant.example", "h")).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_lookup_and_search() {
        let pool = connect_in_memory().await.unwrap();
        let repo = UserRepository::new(pool);

        let u = User::new("mjones", "Mary.Jones@plant.example", "h").with_names(Some("Mary".into()), None);
        repo.add(&u).await.unwrap();
        repo.add(&User::new("pbrown", "pb@plant.example", "h")).await.unwrap();

        assert!(repo.find_by_user_name_or_email("MJONES").await.unwrap().is_some());
        assert!(repo.find_by_user_name_or_email("mary.jones@PLANT.example").await.unwrap().is_some());
        assert!(repo.email_taken("mary.jones@plant.example", None).await.unwrap());
        assert!(!repo.email_taken("mary.jones@plant.example", Some(&u.id)).await.unwrap());

        let (found, total) = repo.search(Some("mary"), 0, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].id, u.id);

        // wildcards are matched literally
        assert_eq!(repo.search(Some("p_rown"), 0, 10).await.unwrap().1, 0);
        assert_eq!(repo.search(Some("%"), 0, 10).await.unwrap().1, 0);

        let (page, total) = repo.search(None, 1, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user_name, "pbrown");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let pool = connect_in_memory().await.unwrap();
        let repo = UserRepository::new(pool);
        let err = repo.update(&User::new("ghost", "g@plant.example", "h")).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
        assert!(!repo.any(&Criteria::new()).await.unwrap());
    }
}
