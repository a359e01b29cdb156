//! Authentication Aggregate
//!
//! Sign-in, token issuance and rotation, password recovery and the
//! signed-in user's account.

pub mod dto;
pub mod email;
pub mod identity;

// Credentials and tokens
pub mod password_service;
pub mod token_service;
pub mod refresh_token;
pub mod refresh_token_repository;

// Services
pub mod authentication_service;
pub mod account_service;

// APIs
pub mod auth_api;
pub mod account_api;

// Re-export main types
pub use authentication_service::AuthenticationService;
pub use account_service::AccountService;
pub use identity::IdentityManager;
pub use password_service::PasswordService;
pub use token_service::TokenService;
pub use email::{EmailMessage, EmailSender};
pub use auth_api::{auth_router, AuthState};
pub use account_api::{account_router, AccountState};
