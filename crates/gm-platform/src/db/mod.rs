//! SQLite connection pool, migrations and error mapping.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::shared::error::{PlatformError, Result};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

impl From<&gm_config::DatabaseConfig> for PoolConfig {
    fn from(config: &gm_config::DatabaseConfig) -> Self {
        PoolConfig::new(config.url.clone()).max_connections(config.max_connections)
    }
}

/// Open a pool. Foreign keys are enforced and file databases use WAL.
pub async fn connect(config: &PoolConfig) -> Result<SqlitePool> {
    let in_memory = config.url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(&config.url)?.foreign_keys(true);
    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    if in_memory {
        // the database lives only as long as one of its connections
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = pool_options.connect_with(options).await?;

    info!(max_connections = config.max_connections, "Database pool created");
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = connect(&PoolConfig::new("sqlite::memory:").max_connections(1)).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Apply the versioned migration scripts under `migrations/`.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Map a write error for `entity`, turning unique violations into a 409.
pub fn map_write_error(entity: &str, err: sqlx::Error) -> PlatformError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            // SQLite reports "UNIQUE constraint failed: table.column"
            let column = db_err
                .message()
                .rsplit('.')
                .next()
                .unwrap_or("unique key")
                .to_string();
            PlatformError::conflict(
                "DUPLICATE",
                format!("{} violates the unique constraint on {}", entity, column),
            )
        }
        _ => PlatformError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema() {
        let pool = connect_in_memory().await.unwrap();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'identity_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 6);
    }
}
