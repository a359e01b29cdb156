//! Token Service
//!
//! HS256 JWT issuing and validation for access tokens and single-purpose
//! password reset tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::shared::error::{PlatformError, Result};
use crate::user::entity::User;
use crate::TsidGenerator;

pub const PASSWORD_RESET_PURPOSE: &str = "password_reset";

/// JWT Claims for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    /// JWT ID
    pub jti: String,
    /// User name
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Claims of a password reset token. `stamp` must equal the user's current
/// security stamp for the token to be accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub purpose: String,
    pub stamp: String,
}

/// Configuration for the token service
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry: Duration,
    pub refresh_token_expiry: Duration,
    pub password_reset_expiry: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            issuer: "gestmantia".to_string(),
            audience: "gestmantia-clients".to_string(),
            access_token_expiry: Duration::minutes(60),
            refresh_token_expiry: Duration::days(7),
            password_reset_expiry: Duration::minutes(60),
        }
    }
}

impl From<&gm_config::JwtConfig> for TokenConfig {
    fn from(config: &gm_config::JwtConfig) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_expiry: Duration::minutes(config.access_token_minutes),
            refresh_token_expiry: Duration::days(config.refresh_token_days),
            password_reset_expiry: Duration::minutes(config.password_reset_minutes),
        }
    }
}

/// Signed access token and its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());
        info!(issuer = %config.issuer, "TokenService initialized with HS256");
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn refresh_token_expiry(&self) -> Duration {
        self.config.refresh_token_expiry
    }

    /// Sign an access token for `user` carrying its roles and permissions.
    pub fn generate_access_token(&self, user: &User, roles: Vec<String>, permissions: Vec<String>) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.config.access_token_expiry;

        let claims = AccessTokenClaims {
            sub: user.id.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: TsidGenerator::generate(),
            name: user.user_name.clone(),
            email: user.email.clone(),
            roles,
            permissions,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PlatformError::internal(format!("Failed to encode JWT: {}", e)))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn validate_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    pub fn generate_password_reset_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = PasswordResetClaims {
            sub: user.id.clone(),
            iss: self.config.issuer.clone(),
            aud: self.reset_audience(),
            exp: (now + self.config.password_reset_expiry).timestamp(),
            iat: now.timestamp(),
            jti: TsidGenerator::generate(),
            purpose: PASSWORD_RESET_PURPOSE.to_string(),
            stamp: user.security_stamp.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PlatformError::internal(format!("Failed to encode reset token: {}", e)))
    }

    /// Validate signature, lifetime and purpose. The stamp is checked by the caller.
    pub fn validate_password_reset_token(&self, token: &str) -> Result<PasswordResetClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[self.reset_audience()]);

        let claims = decode::<PasswordResetClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)?;

        if claims.purpose != PASSWORD_RESET_PURPOSE {
            return Err(PlatformError::InvalidToken {
                message: "Token was not issued for password reset".to_string(),
            });
        }
        Ok(claims)
    }

    // reset tokens never validate as access tokens
    fn reset_audience(&self) -> String {
        format!("{}:{}", self.config.audience, PASSWORD_RESET_PURPOSE)
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> PlatformError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => PlatformError::TokenExpired,
        _ => PlatformError::InvalidToken { message: e.to_string() },
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(TokenConfig {
            secret_key: "test-secret-key-that-is-long-enough-123".to_string(),
            ..Default::default()
        })
    }

    fn user() -> User {
        User::new("planner", "planner@plant.example", "hash")
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let svc = service();
        let u = user();
        let issued = svc
            .generate_access_token(&u, vec!["User".into()], vec!["users.read".into()])
            .unwrap();

        let claims = svc.validate_token(&issued.token).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.name, "planner");
        assert_eq!(claims.email, "planner@plant.example");
        assert_eq!(claims.roles, vec!["User".to_string()]);
        assert_eq!(claims.permissions, vec!["users.read".to_string()]);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expired_token() {
        let svc = TokenService::new(TokenConfig {
            secret_key: "test-secret-key-that-is-long-enough-123".to_string(),
            access_token_expiry: Duration::minutes(-10),
            ..Default::default()
        });
        let issued = svc.generate_access_token(&user(), vec![], vec![]).unwrap();
        assert!(matches!(svc.validate_token(&issued.token), Err(PlatformError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = service().generate_access_token(&user(), vec![], vec![]).unwrap();
        let other = TokenService::new(TokenConfig {
            secret_key: "another-secret-key-that-is-long-enough".to_string(),
            ..Default::default()
        });
        assert!(matches!(other.validate_token(&issued.token), Err(PlatformError::InvalidToken { .. })));
    }

    #[test]
    fn test_reset_token_is_not_an_access_token() {
        let svc = service();
        let u = user();
        let reset = svc.generate_password_reset_token(&u).unwrap();

        let claims = svc.validate_password_reset_token(&reset).unwrap();
        assert_eq!(claims.purpose, PASSWORD_RESET_PURPOSE);
        assert_eq!(claims.stamp, u.security_stamp);
        assert!(svc.validate_token(&reset).is_err());

        let access = svc.generate_access_token(&u, vec![], vec![]).unwrap();
        assert!(svc.validate_password_reset_token(&access.token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
