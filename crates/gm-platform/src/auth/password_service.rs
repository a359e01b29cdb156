//! Password Service
//!
//! Argon2id hashing and the configurable password policy.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::{debug, warn};

use crate::shared::error::{FieldMessages, PlatformError, Result};

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;':\",./<>?`~\\";

/// Password policy configuration
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl From<&gm_config::PasswordPolicyConfig> for PasswordPolicy {
    fn from(config: &gm_config::PasswordPolicyConfig) -> Self {
        Self {
            min_length: config.min_length,
            require_uppercase: config.require_uppercase,
            require_lowercase: config.require_lowercase,
            require_digit: config.require_digit,
            require_special: config.require_special,
            ..Default::default()
        }
    }
}

impl PasswordPolicy {
    /// Every rule the password breaks, empty when it is acceptable.
    pub fn violations(&self, password: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let length = password.chars().count();

        if length < self.min_length {
            errors.push(format!("Password must be at least {} characters", self.min_length));
        }
        if length > self.max_length {
            errors.push(format!("Password must be at most {} characters", self.max_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one digit".to_string());
        }
        if self.require_special && !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            errors.push("Password must contain at least one special character".to_string());
        }

        errors
    }

    /// Less strict policy for development/testing
    pub fn lenient() -> Self {
        Self {
            min_length: 6,
            max_length: 128,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

/// Argon2id configuration
#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_len: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
            output_len: 32,
        }
    }
}

impl Argon2Config {
    /// Low memory config for testing (faster but less secure)
    pub fn testing() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: 32,
        }
    }

    fn to_params(&self) -> Params {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, Some(self.output_len))
            .expect("Invalid Argon2 params")
    }
}

pub struct PasswordService {
    argon2: Argon2<'static>,
    policy: PasswordPolicy,
}

impl PasswordService {
    pub fn new(config: Argon2Config, policy: PasswordPolicy) -> Self {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, config.to_params());
        Self { argon2, policy }
    }

    /// Check `password` against the policy, reporting failures under `field`.
    pub fn validate_password(&self, field: &str, password: &str) -> Result<()> {
        let errors = self.policy.violations(password);
        if errors.is_empty() {
            return Ok(());
        }
        let mut fields = FieldMessages::new();
        fields.insert(field.to_string(), errors);
        Err(PlatformError::Validation {
            message: "Password does not meet the policy".to_string(),
            fields,
        })
    }

    /// Validate against the policy, then hash.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        self.validate_password("password", password)?;
        self.hash_unchecked(password)
    }

    /// Hash without a policy check (seeding and tests).
    pub fn hash_unchecked(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PlatformError::internal(format!("Failed to hash password: {}", e)))?;

        debug!("Password hashed");
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| PlatformError::internal(format!("Invalid password hash format: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => {
                warn!("Password verification failed");
                Ok(false)
            }
            Err(e) => Err(PlatformError::internal(format!("Password verification error: {}", e))),
        }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new(Argon2Config::default(), PasswordPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::new(Argon2Config::testing(), PasswordPolicy::default())
    }

    #[test]
    fn test_hash_and_verify() {
        let svc = service();
        let hash = svc.hash_password("Maint3nance!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(svc.verify_password("Maint3nance!", &hash).unwrap());
        assert!(!svc.verify_password("maint3nance!", &hash).unwrap());
    }

    #[test]
    fn test_policy_reports_each_rule() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.violations("abc").len(), 4);
        assert!(policy.violations("Valid1!pass").is_empty());
    }

    #[test]
    fn test_weak_password_is_validation_error() {
        let err = service().hash_password("short").unwrap_err();
        match err {
            PlatformError::Validation { fields, .. } => assert!(fields.contains_key("password")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_policy_from_config() {
        let config = gm_config::PasswordPolicyConfig {
            min_length: 4,
            require_uppercase: false,
            require_lowercase: true,
            require_digit: false,
            require_special: false,
        };
        let policy = PasswordPolicy::from(&config);
        assert!(policy.violations("abcd").is_empty());
    }

    #[test]
    fn test_garbage_hash_is_internal_error() {
        assert!(service().verify_password("x", "not-a-hash").is_err());
    }
}
