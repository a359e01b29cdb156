//! GestMantIA Platform
//!
//! Identity and access administration for the maintenance management
//! system:
//! - User accounts with lockout, soft delete and role assignment
//! - Roles and permission grants behind named authorization policies
//! - JWT sign-in with rotating refresh tokens and reuse detection
//! - Password recovery and self-service account management
//! - Security event log, alerts and user notifications
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - `dto` - Request and response bodies
//! - `service` - Operations returning `OperationResult`
//! - `api` - REST endpoints

// Aggregates
pub mod user;
pub mod role;
pub mod permission;
pub mod security;

// Authentication & authorization
pub mod auth;

// Infrastructure
pub mod db;
pub mod shared;
pub mod seed;
pub mod app;

pub use gm_common::TsidGenerator;

pub use app::Platform;
pub use shared::error::{PlatformError, Result};
pub use shared::operation::{OperationError, OperationResult};
pub use shared::unit_of_work::UnitOfWork;

// Re-export main entity types for convenience
pub use user::entity::User;
pub use role::entity::Role;
pub use permission::entity::Permission;
pub use security::entity::{AlertSeverity, SecurityAlert, SecurityLog, SecurityNotification};
pub use auth::refresh_token::RefreshToken;
