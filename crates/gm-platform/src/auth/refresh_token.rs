//! Refresh Token Entity
//!
//! Long-lived opaque tokens exchanged for new access tokens. Only the
//! SHA-256 hash is stored; the raw value is handed to the client once.
//!
//! Lifecycle: created at login, rotated at refresh (the old row is revoked
//! and points at its replacement), revoked on logout or reuse detection.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;

use crate::shared::repository::{Entity, SqliteQuery};
use crate::TsidGenerator;

pub const REASON_REPLACED: &str = "Replaced by new token";
pub const REASON_REUSE: &str = "Attempted reuse of revoked ancestor token";
pub const REASON_LOGOUT: &str = "Revoked without replacement";
pub const REASON_PASSWORD_CHANGED: &str = "Password changed";
pub const REASON_USER_DELETED: &str = "User deleted";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by_ip: Option<String>,
    pub revoked_reason: Option<String>,
    /// Hash of the token issued when this one was rotated
    pub replaced_by_token_hash: Option<String>,
}

impl RefreshToken {
    pub fn new(token_hash: impl Into<String>, user_id: impl Into<String>, expiry: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            user_id: user_id.into(),
            token_hash: token_hash.into(),
            expires_at: now + expiry,
            created_at: now,
            created_by_ip: None,
            revoked_at: None,
            revoked_by_ip: None,
            revoked_reason: None,
            replaced_by_token_hash: None,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.created_by_ip = ip;
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }

    pub fn revoke(&mut self, ip: Option<&str>, reason: &str, replaced_by: Option<&str>) {
        self.revoked_at = Some(Utc::now());
        self.revoked_by_ip = ip.map(String::from);
        self.revoked_reason = Some(reason.to_string());
        self.replaced_by_token_hash = replaced_by.map(String::from);
    }

    /// 32 random bytes, base64url without padding
    pub fn generate_raw_token() -> String {
        let bytes: [u8; 32] = rand::random();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn hash_token(raw_token: &str) -> String {
        let digest = Sha256::digest(raw_token.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    }

    /// Fresh raw token and the entity storing its hash.
    pub fn generate_token_pair(user_id: impl Into<String>, expiry: Duration) -> (String, Self) {
        let raw = Self::generate_raw_token();
        let token = Self::new(Self::hash_token(&raw), user_id, expiry);
        (raw, token)
    }
}

impl Entity for RefreshToken {
    const TABLE: &'static str = "identity_refresh_tokens";
    const NAME: &'static str = "RefreshToken";
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "token_hash",
        "expires_at",
        "created_at",
        "created_by_ip",
        "revoked_at",
        "revoked_by_ip",
        "revoked_reason",
        "replaced_by_token_hash",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.user_id)
            .bind(&self.token_hash)
            .bind(self.expires_at)
            .bind(self.created_at)
            .bind(&self.created_by_ip)
            .bind(self.revoked_at)
            .bind(&self.revoked_by_ip)
            .bind(&self.revoked_reason)
            .bind(&self.replaced_by_token_hash)
    }
}
