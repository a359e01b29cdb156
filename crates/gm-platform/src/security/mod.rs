//! Security Aggregate
//!
//! Security event log, alerts and user notifications.

pub mod entity;
pub mod repository;
pub mod service;
pub mod api;

pub use entity::{AlertSeverity, SecurityAlert, SecurityLog, SecurityNotification};
pub use repository::SecurityRepository;
pub use service::SecurityService;
pub use api::{security_router, SecurityState};
