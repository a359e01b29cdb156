//! Security Service
//!
//! Records security logs, alerts and notifications. Recording is best-effort:
//! a failed write is logged and never fails the operation that triggered it.

use metrics::counter;
use tracing::{error, warn};

use super::entity::{AlertSeverity, SecurityAlert, SecurityLog, SecurityNotification};
use super::repository::SecurityRepository;
use crate::shared::operation::{OperationError, OperationResult};

#[derive(Clone)]
pub struct SecurityService {
    repo: SecurityRepository,
}

impl SecurityService {
    pub fn new(repo: SecurityRepository) -> Self {
        Self { repo }
    }

    pub async fn log_event(&self, log: SecurityLog) {
        if let Err(e) = self.repo.logs.add(&log).await {
            error!(error = %e, event_type = %log.event_type, "Failed to write security log");
        }
    }

    pub async fn raise_alert(&self, alert: SecurityAlert) {
        warn!(
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            user_id = ?alert.user_id,
            "Security alert raised: {}",
            alert.message
        );
        counter!("gestmantia_security_alerts_total", "severity" => alert.severity.clone()).increment(1);

        if let Err(e) = self.repo.alerts.add(&alert).await {
            error!(error = %e, alert_type = %alert.alert_type, "Failed to store security alert");
        }
    }

    pub async fn notify(&self, user_id: &str, title: &str, message: &str) {
        let notification = SecurityNotification::new(user_id, title, message);
        if let Err(e) = self.repo.notifications.add(&notification).await {
            error!(error = %e, user_id, "Failed to store security notification");
        }
    }

    pub async fn list_logs(&self, user_id: Option<&str>, page: u32, size: u32) -> OperationResult<(Vec<SecurityLog>, i64)> {
        Ok(self.repo.find_logs(user_id, page, size).await?)
    }

    pub async fn list_alerts(&self, unresolved_only: bool, min_severity: Option<AlertSeverity>) -> OperationResult<Vec<SecurityAlert>> {
        let alerts = self.repo.find_alerts(unresolved_only).await?;
        Ok(match min_severity {
            Some(min) => alerts
                .into_iter()
                .filter(|a| a.severity().is_some_and(|s| s >= min))
                .collect(),
            None => alerts,
        })
    }

    /// Resolving an already resolved alert returns it unchanged.
    pub async fn resolve_alert(&self, id: &str, resolved_by: &str) -> OperationResult<SecurityAlert> {
        let mut alert = self
            .repo
            .alerts
            .get_by_id(id)
            .await?
            .ok_or_else(|| OperationError::not_found("SecurityAlert", id))?;

        if !alert.is_resolved {
            alert.resolve(resolved_by);
            self.repo.alerts.update(&alert).await?;
        }
        Ok(alert)
    }

    pub async fn list_notifications(&self, user_id: &str, unread_only: bool) -> OperationResult<Vec<SecurityNotification>> {
        Ok(self.repo.find_notifications(user_id, unread_only).await?)
    }

    /// Another user's notification is reported as not found.
    pub async fn mark_notification_read(&self, user_id: &str, id: &str) -> OperationResult<SecurityNotification> {
        let mut notification = self
            .repo
            .notifications
            .get_by_id(id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| OperationError::not_found("SecurityNotification", id))?;

        if !notification.is_read {
            notification.mark_read();
            self.repo.notifications.update(&notification).await?;
        }
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::security::entity::events;

    async fn service() -> SecurityService {
        let pool = connect_in_memory().await.unwrap();
        SecurityService::new(SecurityRepository::new(pool))
    }

    #[tokio::test]
    async fn test_logs_are_paged_per_user() {
        let svc = service().await;
        for _ in 0..3 {
            svc.log_event(SecurityLog::new(events::LOGIN_FAILED, "bad password", false).for_user(Some("U1")))
                .await;
        }
        svc.log_event(SecurityLog::new(events::LOGIN_SUCCEEDED, "ok", true).for_user(Some("U2")))
            .await;

        let (page, total) = svc.list_logs(Some("U1"), 0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);

        let (_, all) = svc.list_logs(None, 0, 50).await.unwrap();
        assert_eq!(all, 4);
    }

    #[tokio::test]
    async fn test_resolve_alert() {
        let svc = service().await;
        let alert = SecurityAlert::new("AccountLocked", AlertSeverity::High, "locked");
        let id = alert.id.clone();
        svc.raise_alert(alert).await;
        svc.raise_alert(SecurityAlert::new("Info", AlertSeverity::Low, "fyi")).await;

        assert_eq!(svc.list_alerts(true, Some(AlertSeverity::High)).await.unwrap().len(), 1);

        let resolved = svc.resolve_alert(&id, "admin").await.unwrap();
        assert!(resolved.is_resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("admin"));
        assert_eq!(svc.list_alerts(true, None).await.unwrap().len(), 1);

        let missing = svc.resolve_alert("NOPE", "admin").await.unwrap_err();
        assert!(matches!(missing, OperationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_notifications_scoped_to_owner() {
        let svc = service().await;
        svc.notify("U1", "Password changed", "Your password was changed").await;
        let n = svc.list_notifications("U1", true).await.unwrap().remove(0);

        assert!(svc.mark_notification_read("U2", &n.id).await.is_err());
        let read = svc.mark_notification_read("U1", &n.id).await.unwrap();
        assert!(read.is_read);
        assert!(svc.list_notifications("U1", true).await.unwrap().is_empty());
        assert_eq!(svc.list_notifications("U1", false).await.unwrap().len(), 1);
    }
}
