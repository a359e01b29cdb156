//! Token storage for the GestMantIA SDK
//!
//! The client keeps the signed-in user's access/refresh token pair in a
//! [`TokenStore`]. The default store lives in memory; applications that
//! persist sessions provide their own.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// An access token with the refresh token that renews it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Whether the access token expires within the next minute.
    pub fn is_expiring(&self) -> bool {
        self.expires_at <= Utc::now() + chrono::Duration::seconds(60)
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Option<TokenPair>;

    async fn set(&self, tokens: TokenPair);

    async fn clear(&self);
}

/// Process-local token store
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenStore {
    tokens: Arc<RwLock<Option<TokenPair>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }

    async fn set(&self, tokens: TokenPair) {
        *self.tokens.write().await = Some(tokens);
    }

    async fn clear(&self) {
        *self.tokens.write().await = None;
    }
}
