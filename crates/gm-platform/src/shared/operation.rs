//! Operation Results
//!
//! Services return `OperationResult<T>`: either the value or a categorized
//! `OperationError` carrying a code and a message list. The API layer turns
//! failures into HTTP responses through `PlatformError`.
//!
//! Status mapping:
//! - `Validation` -> 400
//! - `Unauthorized` -> 401
//! - `Forbidden` -> 403
//! - `NotFound` -> 404
//! - `Conflict` -> 409
//! - `Failed` -> 500

use serde::Serialize;

use crate::shared::error::{FieldMessages, PlatformError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OperationError {
    Validation { message: String, fields: FieldMessages },
    NotFound { entity: String, id: String },
    Conflict { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { message: String },
    Failed { message: String },
}

pub type OperationResult<T> = std::result::Result<T, OperationError>;

impl OperationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: FieldMessages::new(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = FieldMessages::new();
        fields.insert(field.into(), vec![message.clone()]);
        Self::Validation { message, fields }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_credentials() -> Self {
        Self::unauthorized("INVALID_CREDENTIALS", "Invalid user name or password")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { code, .. } | Self::Unauthorized { code, .. } => code,
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Failed { .. } => "OPERATION_FAILED",
        }
    }

    /// Every message carried by this error, field messages flattened.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation { message, fields } if fields.is_empty() => vec![message.clone()],
            Self::Validation { fields, .. } => fields
                .iter()
                .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{}: {}", field, m)))
                .collect(),
            Self::NotFound { entity, id } => vec![format!("{} '{}' was not found", entity, id)],
            Self::Conflict { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message }
            | Self::Failed { message } => vec![message.clone()],
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.messages().join("; "))
    }
}

impl std::error::Error for OperationError {}

impl From<PlatformError> for OperationError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound { entity_type, id } => Self::NotFound { entity: entity_type, id },
            PlatformError::Duplicate { entity_type, field, value } => Self::Conflict {
                code: "DUPLICATE".to_string(),
                message: format!("{} with {} '{}' already exists", entity_type, field, value),
            },
            PlatformError::Conflict { code, message } => Self::Conflict { code, message },
            PlatformError::Validation { message, fields } => Self::Validation { message, fields },
            PlatformError::InvalidCredentials => Self::invalid_credentials(),
            PlatformError::TokenExpired => Self::unauthorized("TOKEN_EXPIRED", "Token expired"),
            PlatformError::InvalidToken { message } => Self::unauthorized("INVALID_TOKEN", message),
            PlatformError::Unauthorized { message } => Self::unauthorized("UNAUTHORIZED", message),
            PlatformError::Forbidden { message } => Self::Forbidden { message },
            other => Self::Failed { message: other.to_string() },
        }
    }
}
