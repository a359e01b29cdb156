//! Request validation helpers producing field-level messages.

use std::sync::LazyLock;

use regex::Regex;

use crate::shared::error::FieldMessages;
use crate::shared::operation::{OperationError, OperationResult};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

static USER_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._@+-]+$").expect("valid user name pattern")
});

/// Normalized form used for unique lookups of names and emails.
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Collects validation failures keyed by the JSON field name.
#[derive(Debug, Default)]
pub struct Validator {
    fields: FieldMessages,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.fields.entry(field.to_string()).or_default().push(message.into());
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, format!("{} is required", field));
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(v) = value {
            if v.chars().count() > max {
                self.add(field, format!("{} must be at most {} characters", field, max));
            }
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.trim().is_empty() && !is_valid_email(value) {
            self.add(field, "Email format is invalid");
        }
        self
    }

    pub fn user_name(&mut self, field: &str, value: &str) -> &mut Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return self;
        }
        if trimmed.chars().count() < 3 {
            self.add(field, format!("{} must be at least 3 characters", field));
        }
        if !USER_NAME_RE.is_match(trimmed) {
            self.add(field, format!("{} contains invalid characters", field));
        }
        self
    }

    pub fn matches(&mut self, field: &str, value: &str, other: &str) -> &mut Self {
        if value != other {
            self.add(field, "Passwords do not match");
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(&mut self) -> OperationResult<()> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(OperationError::Validation {
                message: "One or more validation errors occurred".to_string(),
                fields: std::mem::take(&mut self.fields),
            })
        }
    }
}
