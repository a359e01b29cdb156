//! Unit of Work
//!
//! Groups several repository writes into one SQLite transaction. Pass
//! `uow.conn()` to the repositories' `*_with` methods, then `commit()`.
//! A unit that is dropped without committing rolls back.
//!
//! ```ignore
//! let mut uow = UnitOfWork::begin(&pool).await?;
//! self.users.add_with(uow.conn(), &user).await?;
//! self.user_roles.assign_with(uow.conn(), &user.id, &role.id, actor).await?;
//! uow.commit().await?;
//! ```
//!
//! While a unit is open its connection is held out of the pool; do not issue
//! pool-level queries from the same task until it is finished.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use crate::shared::error::Result;

pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let tx = pool.begin().await?;
        debug!("Unit of work started");
        Ok(Self { tx })
    }

    /// Connection bound to the open transaction.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        debug!("Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    async fn count_roles(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM identity_roles")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn insert_role(conn: &mut SqliteConnection, id: &str, name: &str) {
        sqlx::query(
            "INSERT INTO identity_roles (id, name, normalized_name, is_system, created_at, updated_at, is_deleted)
             VALUES (?, ?, ?, 0, datetime('now'), datetime('now'), 0)",
        )
        .bind(id)
        .bind(name)
        .bind(name.to_uppercase())
        .execute(conn)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let pool = connect_in_memory().await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        insert_role(uow.conn(), "R1", "Planner").await;
        insert_role(uow.conn(), "R2", "Technician").await;
        uow.commit().await.unwrap();

        assert_eq!(count_roles(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let pool = connect_in_memory().await.unwrap();
        {
            let mut uow = UnitOfWork::begin(&pool).await.unwrap();
            insert_role(uow.conn(), "R1", "Planner").await;
        }
        assert_eq!(count_roles(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let pool = connect_in_memory().await.unwrap();
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        insert_role(uow.conn(), "R1", "Planner").await;
        uow.rollback().await.unwrap();

        assert_eq!(count_roles(&pool).await, 0);
    }
}
