//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "gestmantia.toml",
    "./config/config.toml",
    "/etc/gestmantia/config.toml",
];

const CONFIG_ENV_VAR: &str = "GESTMANTIA_CONFIG";

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match self.find_config_file() {
            Some(path) => {
                info!(?path, "Loading configuration from file");
                AppConfig::from_file(&path)?
            }
            None => AppConfig::default(),
        };

        apply_overrides(&mut config, |key| env::var(key).ok());
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!(?path, "Configured file does not exist, searching defaults");
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_into<T: FromStr>(target: &mut T, key: &str, value: Option<String>) {
    if let Some(raw) = value {
        match raw.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %raw, "Ignoring unparsable override"),
        }
    }
}

/// Apply `GESTMANTIA_*` overrides using `lookup` to read variables.
pub(crate) fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // HTTP
    parse_into(&mut config.http.port, "GESTMANTIA_HTTP_PORT", lookup("GESTMANTIA_HTTP_PORT"));
    if let Some(val) = lookup("GESTMANTIA_HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(val) = lookup("GESTMANTIA_CORS_ORIGINS") {
        config.http.cors_origins = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    // Database
    if let Some(val) = lookup("GESTMANTIA_DATABASE_URL") {
        config.database.url = val;
    }
    parse_into(
        &mut config.database.max_connections,
        "GESTMANTIA_DATABASE_MAX_CONNECTIONS",
        lookup("GESTMANTIA_DATABASE_MAX_CONNECTIONS"),
    );

    // JWT
    if let Some(val) = lookup("GESTMANTIA_JWT_SECRET_KEY") {
        config.jwt.secret_key = val;
    }
    if let Some(val) = lookup("GESTMANTIA_JWT_ISSUER") {
        config.jwt.issuer = val;
    }
    if let Some(val) = lookup("GESTMANTIA_JWT_AUDIENCE") {
        config.jwt.audience = val;
    }
    parse_into(
        &mut config.jwt.access_token_minutes,
        "GESTMANTIA_JWT_ACCESS_TOKEN_MINUTES",
        lookup("GESTMANTIA_JWT_ACCESS_TOKEN_MINUTES"),
    );
    parse_into(
        &mut config.jwt.refresh_token_days,
        "GESTMANTIA_JWT_REFRESH_TOKEN_DAYS",
        lookup("GESTMANTIA_JWT_REFRESH_TOKEN_DAYS"),
    );

    // Security
    parse_into(
        &mut config.security.max_failed_access_attempts,
        "GESTMANTIA_SECURITY_MAX_FAILED_ATTEMPTS",
        lookup("GESTMANTIA_SECURITY_MAX_FAILED_ATTEMPTS"),
    );
    parse_into(
        &mut config.security.lockout_minutes,
        "GESTMANTIA_SECURITY_LOCKOUT_MINUTES",
        lookup("GESTMANTIA_SECURITY_LOCKOUT_MINUTES"),
    );

    // Seed
    parse_into(&mut config.seed.enabled, "GESTMANTIA_SEED_ENABLED", lookup("GESTMANTIA_SEED_ENABLED"));
    if let Some(val) = lookup("GESTMANTIA_SEED_ADMIN_USER_NAME") {
        config.seed.admin_user_name = val;
    }
    if let Some(val) = lookup("GESTMANTIA_SEED_ADMIN_EMAIL") {
        config.seed.admin_email = val;
    }
    if let Some(val) = lookup("GESTMANTIA_SEED_ADMIN_PASSWORD") {
        config.seed.admin_password = val;
    }

    // Metrics
    parse_into(&mut config.metrics.enabled, "GESTMANTIA_METRICS_ENABLED", lookup("GESTMANTIA_METRICS_ENABLED"));
    if let Some(val) = lookup("GESTMANTIA_METRICS_PATH") {
        config.metrics.path = val;
    }

    // Email
    parse_into(&mut config.email.dev_mode, "GESTMANTIA_EMAIL_DEV_MODE", lookup("GESTMANTIA_EMAIL_DEV_MODE"));
    if let Some(val) = lookup("GESTMANTIA_EMAIL_FROM") {
        config.email.from_address = val;
    }
    if let Some(val) = lookup("GESTMANTIA_SMTP_HOST") {
        config.email.smtp_host = val;
    }
    parse_into(&mut config.email.smtp_port, "GESTMANTIA_SMTP_PORT", lookup("GESTMANTIA_SMTP_PORT"));
    if let Some(val) = lookup("GESTMANTIA_SMTP_USERNAME") {
        config.email.smtp_username = val;
    }
    if let Some(val) = lookup("GESTMANTIA_SMTP_PASSWORD") {
        config.email.smtp_password = val;
    }

    // General
    parse_into(&mut config.dev_mode, "GESTMANTIA_DEV_MODE", lookup("GESTMANTIA_DEV_MODE"));
}
