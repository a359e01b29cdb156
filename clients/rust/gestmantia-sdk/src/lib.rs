//! GestMantIA Rust SDK
//!
//! Typed client for the GestMantIA identity and security administration
//! API: sign-in with automatic token renewal, user and role management.
//!
//! ```no_run
//! use gestmantia_sdk::{Client, Config};
//!
//! # async fn run() -> gestmantia_sdk::Result<()> {
//! let client = Client::new(Config::new("http://localhost:8080"))?;
//! client.login("admin", "Admin123!").await?;
//!
//! let page = client.users().list(0, 20, None).await?;
//! println!("{} users", page.total);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod roles;
pub mod users;

pub use auth::{InMemoryTokenStore, TokenPair, TokenStore};
pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
