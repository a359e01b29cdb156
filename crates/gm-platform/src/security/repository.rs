//! Security record repositories.

use sqlx::SqlitePool;

use super::entity::{SecurityAlert, SecurityLog, SecurityNotification};
use crate::shared::error::Result;
use crate::shared::repository::{Criteria, Repository};

/// Data access for logs, alerts and notifications.
#[derive(Clone)]
pub struct SecurityRepository {
    pub logs: Repository<SecurityLog>,
    pub alerts: Repository<SecurityAlert>,
    pub notifications: Repository<SecurityNotification>,
}

impl SecurityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            logs: Repository::new(pool.clone()),
            alerts: Repository::new(pool.clone()),
            notifications: Repository::new(pool),
        }
    }

    /// Newest first.
    pub async fn find_logs(&self, user_id: Option<&str>, page: u32, size: u32) -> Result<(Vec<SecurityLog>, i64)> {
        let mut criteria = Criteria::new();
        if let Some(user_id) = user_id {
            criteria = criteria.eq("user_id", user_id);
        }
        let total = self.logs.count(&criteria).await?;
        let rows = self
            .logs
            .list_by(&criteria.order_by("occurred_at", true).page(page, size))
            .await?;
        Ok((rows, total))
    }

    pub async fn find_alerts(&self, unresolved_only: bool) -> Result<Vec<SecurityAlert>> {
        let mut criteria = Criteria::new();
        if unresolved_only {
            criteria = criteria.eq("is_resolved", false);
        }
        self.alerts.list_by(&criteria.order_by("created_at", true)).await
    }

    pub async fn find_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<SecurityNotification>> {
        let mut criteria = Criteria::new().eq("user_id", user_id);
        if unread_only {
            criteria = criteria.eq("is_read", false);
        }
        self.notifications.list_by(&criteria.order_by("created_at", true)).await
    }
}
