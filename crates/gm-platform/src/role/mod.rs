//! Role Aggregate
//!
//! Roles and the permissions granted to them.

pub mod entity;
pub mod repository;
pub mod dto;
pub mod service;
pub mod api;

// Re-export main types
pub use entity::{roles, Role};
pub use repository::{RolePermissionRepository, RoleRepository};
pub use service::RoleService;
pub use api::{roles_router, RolesState};
