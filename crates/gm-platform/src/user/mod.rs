//! User Aggregate
//!
//! User accounts and their role assignments.

pub mod entity;
pub mod repository;
pub mod dto;
pub mod service;
pub mod api;

// Re-export main types
pub use entity::User;
pub use repository::{UserRepository, UserRoleRepository};
pub use service::UserService;
pub use api::{users_router, UsersState};
