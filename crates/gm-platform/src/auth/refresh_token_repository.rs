//! Refresh Token Repository

use std::ops::Deref;

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use super::refresh_token::RefreshToken;
use crate::shared::error::Result;
use crate::shared::repository::{Criteria, Repository};

pub struct RefreshTokenRepository {
    repo: Repository<RefreshToken>,
}

impl Deref for RefreshTokenRepository {
    type Target = Repository<RefreshToken>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

impl RefreshTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { repo: Repository::new(pool) }
    }

    /// Look up by the hash of the raw token presented by the client.
    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        self.repo.find_one(&Criteria::new().eq("token_hash", token_hash)).await
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<RefreshToken>> {
        self.repo
            .list_by(&Criteria::new().eq("user_id", user_id).order_by("created_at", true))
            .await
    }

    pub async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<RefreshToken>> {
        Ok(self
            .find_by_user(user_id)
            .await?
            .into_iter()
            .filter(RefreshToken::is_active)
            .collect())
    }

    /// Revoke one token only if it is still unrevoked. Returns whether this
    /// call revoked it; `false` means another caller got there first.
    pub async fn revoke_if_active_with<'e, X>(
        &self,
        executor: X,
        id: &str,
        ip: Option<&str>,
        reason: &str,
        replaced_by: Option<&str>,
    ) -> Result<bool>
    where
        X: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE identity_refresh_tokens
             SET revoked_at = ?, revoked_by_ip = ?, revoked_reason = ?, replaced_by_token_hash = ?
             WHERE id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(ip)
        .bind(reason)
        .bind(replaced_by)
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Revoke every unrevoked token of the user. Returns how many were revoked.
    pub async fn revoke_all_for_user_with<'e, X>(&self, executor: X, user_id: &str, ip: Option<&str>, reason: &str) -> Result<u64>
    where
        X: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE identity_refresh_tokens
             SET revoked_at = ?, revoked_by_ip = ?, revoked_reason = ?
             WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(ip)
        .bind(reason)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn revoke_all_for_user(&self, user_id: &str, ip: Option<&str>, reason: &str) -> Result<u64> {
        self.revoke_all_for_user_with(self.repo.pool(), user_id, ip, reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::refresh_token::{REASON_LOGOUT, REASON_REPLACED};
    use crate::db::connect_in_memory;
    use crate::user::entity::User;
    use crate::user::repository::UserRepository;
    use chrono::Duration;

    #[tokio::test]
    async fn test_find_and_revoke_all() {
        let pool = connect_in_memory().await.unwrap();
        let users = UserRepository::new(pool.clone());
        let tokens = RefreshTokenRepository::new(pool);

        let user = User::new("tech1", "tech1@plant.example", "h");
        users.add(&user).await.unwrap();

        let (raw, first) = RefreshToken::generate_token_pair(&user.id, Duration::days(7));
        let (_, second) = RefreshToken::generate_token_pair(&user.id, Duration::days(7));
        tokens.add(&first).await.unwrap();
        tokens.add(&second).await.unwrap();

        let found = tokens.find_by_hash(&RefreshToken::hash_token(&raw)).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(tokens.find_active_by_user(&user.id).await.unwrap().len(), 2);

        let revoked = tokens.revoke_all_for_user(&user.id, None, REASON_LOGOUT).await.unwrap();
        assert_eq!(revoked, 2);
        assert!(tokens.find_active_by_user(&user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_if_active_claims_token_once() {
        let pool = connect_in_memory().await.unwrap();
        let users = UserRepository::new(pool.clone());
        let tokens = RefreshTokenRepository::new(pool.clone());

        let user = User::new("tech1", "tech1@plant.example", "h");
        users.add(&user).await.unwrap();
        let (_, token) = RefreshToken::generate_token_pair(&user.id, Duration::days(7));
        tokens.add(&token).await.unwrap();

        let first = tokens
            .revoke_if_active_with(&pool, &token.id, Some("10.0.0.1"), REASON_REPLACED, Some("next-hash"))
            .await
            .unwrap();
        let second = tokens
            .revoke_if_active_with(&pool, &token.id, Some("10.0.0.2"), REASON_REPLACED, Some("other-hash"))
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        let stored = tokens.get_by_id(&token.id).await.unwrap().unwrap();
        assert_eq!(stored.revoked_by_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(stored.replaced_by_token_hash.as_deref(), Some("next-hash"));
    }
}
