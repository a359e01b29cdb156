//! Security log, alert and notification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::shared::repository::{Entity, SqliteQuery};
use crate::TsidGenerator;

/// Security event types recorded in the log
pub mod events {
    pub const LOGIN_SUCCEEDED: &str = "LoginSucceeded";
    pub const LOGIN_FAILED: &str = "LoginFailed";
    pub const ACCOUNT_LOCKED: &str = "AccountLocked";
    pub const ACCOUNT_UNLOCKED: &str = "AccountUnlocked";
    pub const USER_REGISTERED: &str = "UserRegistered";
    pub const USER_DELETED: &str = "UserDeleted";
    pub const TOKEN_REFRESHED: &str = "TokenRefreshed";
    pub const TOKEN_REVOKED: &str = "TokenRevoked";
    pub const TOKEN_REUSE_DETECTED: &str = "TokenReuseDetected";
    pub const PASSWORD_RESET_REQUESTED: &str = "PasswordResetRequested";
    pub const PASSWORD_RESET: &str = "PasswordReset";
    pub const PASSWORD_CHANGED: &str = "PasswordChanged";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Append-only record of a security-relevant event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecurityLog {
    pub id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_success: bool,
    pub occurred_at: DateTime<Utc>,
}

impl SecurityLog {
    pub fn new(event_type: impl Into<String>, description: impl Into<String>, is_success: bool) -> Self {
        Self {
            id: TsidGenerator::generate(),
            user_id: None,
            event_type: event_type.into(),
            description: description.into(),
            ip_address: None,
            user_agent: None,
            is_success,
            occurred_at: Utc::now(),
        }
    }

    pub fn for_user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(String::from);
        self
    }

    pub fn with_client(mut self, ip_address: Option<&str>, user_agent: Option<&str>) -> Self {
        self.ip_address = ip_address.map(String::from);
        self.user_agent = user_agent.map(String::from);
        self
    }
}

impl Entity for SecurityLog {
    const TABLE: &'static str = "security_logs";
    const NAME: &'static str = "SecurityLog";
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "event_type",
        "description",
        "ip_address",
        "user_agent",
        "is_success",
        "occurred_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.user_id)
            .bind(&self.event_type)
            .bind(&self.description)
            .bind(&self.ip_address)
            .bind(&self.user_agent)
            .bind(self.is_success)
            .bind(self.occurred_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecurityAlert {
    pub id: String,
    pub user_id: Option<String>,
    pub alert_type: String,
    /// Stored as the `AlertSeverity` name
    pub severity: String,
    pub message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SecurityAlert {
    pub fn new(alert_type: impl Into<String>, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            id: TsidGenerator::generate(),
            user_id: None,
            alert_type: alert_type.into(),
            severity: severity.as_str().to_string(),
            message: message.into(),
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(String::from);
        self
    }

    pub fn severity(&self) -> Option<AlertSeverity> {
        AlertSeverity::parse(&self.severity)
    }

    pub fn resolve(&mut self, resolved_by: &str) {
        self.is_resolved = true;
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(resolved_by.to_string());
    }
}

impl Entity for SecurityAlert {
    const TABLE: &'static str = "security_alerts";
    const NAME: &'static str = "SecurityAlert";
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "alert_type",
        "severity",
        "message",
        "is_resolved",
        "resolved_at",
        "resolved_by",
        "created_at",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.user_id)
            .bind(&self.alert_type)
            .bind(&self.severity)
            .bind(&self.message)
            .bind(self.is_resolved)
            .bind(self.resolved_at)
            .bind(&self.resolved_by)
            .bind(self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecurityNotification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecurityNotification {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: TsidGenerator::generate(),
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_read(&mut self) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(Utc::now());
        }
    }
}

impl Entity for SecurityNotification {
    const TABLE: &'static str = "security_notifications";
    const NAME: &'static str = "SecurityNotification";
    const COLUMNS: &'static [&'static str] = &["user_id", "title", "message", "is_read", "read_at", "created_at"];

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.user_id)
            .bind(&self.title)
            .bind(&self.message)
            .bind(self.is_read)
            .bind(self.read_at)
            .bind(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_round_trip_and_order() {
        let alert = SecurityAlert::new("TokenReuse", AlertSeverity::Critical, "reuse");
        assert_eq!(alert.severity, "Critical");
        assert_eq!(alert.severity(), Some(AlertSeverity::Critical));
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert_eq!(AlertSeverity::parse("bogus"), None);
    }

    #[test]
    fn test_mark_read_keeps_first_timestamp() {
        let mut n = SecurityNotification::new("U1", "Password changed", "Your password was changed");
        n.mark_read();
        let first = n.read_at;
        n.mark_read();
        assert_eq!(n.read_at, first);
    }
}
