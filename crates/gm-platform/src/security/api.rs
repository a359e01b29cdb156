//! Security API
//!
//! Security log and alert review for administrators, and the signed-in
//! user's own security notifications.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::entity::{AlertSeverity, SecurityAlert, SecurityLog, SecurityNotification};
use super::service::SecurityService;
use crate::shared::api_common::{PaginatedResponse, PaginationParams};
use crate::shared::authorization::{policies, PolicyMap};
use crate::shared::error::PlatformError;
use crate::shared::middleware::Authenticated;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_success: bool,
    pub occurred_at: DateTime<Utc>,
}

impl From<SecurityLog> for SecurityLogResponse {
    fn from(l: SecurityLog) -> Self {
        Self {
            id: l.id,
            user_id: l.user_id,
            event_type: l.event_type,
            description: l.description,
            ip_address: l.ip_address,
            user_agent: l.user_agent,
            is_success: l.is_success,
            occurred_at: l.occurred_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlertResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SecurityAlert> for SecurityAlertResponse {
    fn from(a: SecurityAlert) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            alert_type: a.alert_type,
            severity: a.severity,
            message: a.message,
            is_resolved: a.is_resolved,
            resolved_at: a.resolved_at,
            resolved_by: a.resolved_by,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityNotificationResponse {
    pub id: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SecurityNotification> for SecurityNotificationResponse {
    fn from(n: SecurityNotification) -> Self {
        Self {
            id: n.id,
            title: n.title,
            message: n.message,
            is_read: n.is_read,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    /// Only events of this user
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AlertsQuery {
    #[serde(default)]
    pub unresolved_only: bool,

    /// Low, Medium, High or Critical
    pub min_severity: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Clone)]
pub struct SecurityState {
    pub service: SecurityService,
    pub policies: Arc<PolicyMap>,
}

/// Security event log, newest first
#[utoipa::path(
    get,
    path = "/logs",
    tag = "security",
    operation_id = "getApiSecurityLogs",
    params(LogsQuery),
    responses(
        (status = 200, description = "Page of security events", body = PaginatedResponse<SecurityLogResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_logs(
    State(state): State<SecurityState>,
    auth: Authenticated,
    Query(query): Query<LogsQuery>,
) -> Result<Json<PaginatedResponse<SecurityLogResponse>>, PlatformError> {
    state.policies.require(policies::SECURITY_READ, &auth)?;

    let (page, size) = (query.pagination.page(), query.pagination.size());
    let (logs, total) = state.service.list_logs(query.user_id.as_deref(), page, size).await?;
    let data = logs.into_iter().map(SecurityLogResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, page, size, total.max(0) as u64)))
}

/// Security alerts, newest first
#[utoipa::path(
    get,
    path = "/alerts",
    tag = "security",
    operation_id = "getApiSecurityAlerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Security alerts", body = Vec<SecurityAlertResponse>),
        (status = 400, description = "Unknown severity")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_alerts(
    State(state): State<SecurityState>,
    auth: Authenticated,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<SecurityAlertResponse>>, PlatformError> {
    state.policies.require(policies::SECURITY_READ, &auth)?;

    let min_severity = match query.min_severity.as_deref() {
        Some(value) => Some(
            AlertSeverity::parse(value)
                .ok_or_else(|| PlatformError::validation(format!("Unknown severity: {}", value)))?,
        ),
        None => None,
    };

    let alerts = state.service.list_alerts(query.unresolved_only, min_severity).await?;
    Ok(Json(alerts.into_iter().map(SecurityAlertResponse::from).collect()))
}

/// Resolve a security alert
#[utoipa::path(
    post,
    path = "/alerts/{id}/resolve",
    tag = "security",
    operation_id = "postApiSecurityAlertsByIdResolve",
    params(("id" = String, Path, description = "Alert id")),
    responses(
        (status = 200, description = "Alert resolved", body = SecurityAlertResponse),
        (status = 404, description = "Alert not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn resolve_alert(
    State(state): State<SecurityState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SecurityAlertResponse>, PlatformError> {
    state.policies.require(policies::SECURITY_WRITE, &auth)?;
    let alert = state.service.resolve_alert(&id, &auth.user_name).await?;
    Ok(Json(alert.into()))
}

/// The caller's security notifications
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "security",
    operation_id = "getApiSecurityNotifications",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "Notifications", body = Vec<SecurityNotificationResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<SecurityState>,
    auth: Authenticated,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<SecurityNotificationResponse>>, PlatformError> {
    state.policies.require(policies::AUTHENTICATED, &auth)?;
    let notifications = state.service.list_notifications(&auth.user_id, query.unread_only).await?;
    Ok(Json(notifications.into_iter().map(SecurityNotificationResponse::from).collect()))
}

/// Mark one of the caller's notifications as read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "security",
    operation_id = "postApiSecurityNotificationsByIdRead",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification read", body = SecurityNotificationResponse),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_notification_read(
    State(state): State<SecurityState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<SecurityNotificationResponse>, PlatformError> {
    state.policies.require(policies::AUTHENTICATED, &auth)?;
    let notification = state.service.mark_notification_read(&auth.user_id, &id).await?;
    Ok(Json(notification.into()))
}

pub fn security_router(state: SecurityState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_logs))
        .routes(routes!(list_alerts))
        .routes(routes!(resolve_alert))
        .routes(routes!(list_notifications))
        .routes(routes!(mark_notification_read))
        .with_state(state)
}
