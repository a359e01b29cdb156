//! GestMantIA Configuration
//!
//! TOML-based configuration with environment variable overrides. Every
//! section has defaults so an empty file (or no file) yields a runnable
//! development setup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Minimum length of the HMAC signing secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub seed: SeedConfig,
    pub metrics: MetricsConfig,
    pub email: EmailConfig,

    /// Enable development mode
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:5000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLx connection string, e.g. `sqlite://gestmantia.db?mode=rwc`
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://gestmantia.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC secret used for HS256 signing
    pub secret_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub password_reset_minutes: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            issuer: "gestmantia".to_string(),
            audience: "gestmantia-clients".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 7,
            password_reset_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Failed logins allowed before the account is locked
    pub max_failed_access_attempts: i32,
    pub lockout_minutes: i64,
    pub password: PasswordPolicyConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_access_attempts: 5,
            lockout_minutes: 15,
            password: PasswordPolicyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicyConfig {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub enabled: bool,
    pub admin_user_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_user_name: "admin".to_string(),
            admin_email: "admin@gestmantia.local".to_string(),
            admin_password: "Admin123!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Log messages instead of sending them
    pub dev_mode: bool,
    pub from_address: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// Base URL of the front end, used to build reset links
    pub frontend_base_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            dev_mode: true,
            from_address: "no-reply@gestmantia.local".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            frontend_base_url: "http://localhost:5000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Check values that have no safe default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::ValidationError("http.port must be greater than 0".into()));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("database.url is required".into()));
        }
        if self.jwt.secret_key.len() < MIN_SECRET_LEN {
            return Err(ConfigError::ValidationError(format!(
                "jwt.secret_key must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.jwt.access_token_minutes <= 0 || self.jwt.refresh_token_days <= 0 {
            return Err(ConfigError::ValidationError("token lifetimes must be positive".into()));
        }
        if self.security.max_failed_access_attempts <= 0 {
            return Err(ConfigError::ValidationError(
                "security.max_failed_access_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# GestMantIA Configuration
# GESTMANTIA_* environment variables override these settings

dev_mode = false

[http]
port = 8080
host = "0.0.0.0"
cors_origins = ["http://localhost:5000"]

[database]
url = "sqlite://gestmantia.db?mode=rwc"
max_connections = 5

[jwt]
secret_key = "change-me-to-a-long-random-secret-value"
issuer = "gestmantia"
audience = "gestmantia-clients"
access_token_minutes = 60
refresh_token_days = 7
password_reset_minutes = 60

[security]
max_failed_access_attempts = 5
lockout_minutes = 15

[security.password]
min_length = 8
require_uppercase = true
require_lowercase = true
require_digit = true
require_special = true

[seed]
enabled = true
admin_user_name = "admin"
admin_email = "admin@gestmantia.local"
admin_password = "Admin123!"

[metrics]
enabled = true
path = "/metrics"

[email]
dev_mode = true
from_address = "no-reply@gestmantia.local"
smtp_host = "localhost"
smtp_port = 587
frontend_base_url = "http://localhost:5000"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.jwt.issuer, "gestmantia");
        assert_eq!(config.security.max_failed_access_attempts, 5);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_example_parses_and_validates() {
        let config = AppConfig::from_toml_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.security.password.min_length, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str("[http]\nport = 9000\n").unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.jwt.refresh_token_days, 7);
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = AppConfig::default();
        config.jwt.secret_key = "too-short".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
