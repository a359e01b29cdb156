//! Permission Aggregate

pub mod entity;
pub mod repository;
pub mod dto;
pub mod service;
pub mod api;

pub use entity::{permissions, Permission};
pub use repository::PermissionRepository;
pub use service::PermissionService;
pub use api::{permissions_router, PermissionsState};
