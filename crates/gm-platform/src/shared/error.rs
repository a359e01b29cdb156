//! Platform Error Types

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::shared::operation::OperationError;

/// Field name to validation messages.
pub type FieldMessages = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("{message}")]
    Conflict { code: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String, fields: FieldMessages },

    #[error("Authorization error: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: FieldMessages::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PlatformError::NotFound { .. } => StatusCode::NOT_FOUND,
            PlatformError::Duplicate { .. } | PlatformError::Conflict { .. } => StatusCode::CONFLICT,
            PlatformError::Validation { .. } => StatusCode::BAD_REQUEST,
            PlatformError::Unauthorized { .. }
            | PlatformError::InvalidCredentials
            | PlatformError::TokenExpired
            | PlatformError::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            PlatformError::Forbidden { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> String {
        match self {
            PlatformError::NotFound { .. } => "NOT_FOUND".to_string(),
            PlatformError::Duplicate { .. } => "DUPLICATE".to_string(),
            PlatformError::Conflict { code, .. } => code.clone(),
            PlatformError::Validation { .. } => "VALIDATION_ERROR".to_string(),
            PlatformError::Unauthorized { .. } => "UNAUTHORIZED".to_string(),
            PlatformError::Forbidden { .. } => "FORBIDDEN".to_string(),
            PlatformError::InvalidCredentials => "INVALID_CREDENTIALS".to_string(),
            PlatformError::TokenExpired => "TOKEN_EXPIRED".to_string(),
            PlatformError::InvalidToken { .. } => "INVALID_TOKEN".to_string(),
            _ => "INTERNAL_ERROR".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Error response body
#[derive(Debug, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: FieldMessages,
}

impl ErrorResponse {
    pub fn internal() -> Self {
        Self {
            error: "INTERNAL_ERROR".to_string(),
            message: "An unexpected error occurred".to_string(),
            details: FieldMessages::new(),
        }
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = if status.is_server_error() {
            error!(error = %self, "Request failed with an internal error");
            ErrorResponse::internal()
        } else {
            let error = self.error_code();
            let (message, details) = match self {
                PlatformError::Validation { message, fields } => (message, fields),
                other => (other.to_string(), FieldMessages::new()),
            };
            ErrorResponse { error, message, details }
        };

        (status, Json(body)).into_response()
    }
}

impl From<OperationError> for PlatformError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Validation { message, fields } => PlatformError::Validation { message, fields },
            OperationError::NotFound { entity, id } => PlatformError::NotFound { entity_type: entity, id },
            OperationError::Conflict { code, message } => PlatformError::Conflict { code, message },
            OperationError::Unauthorized { code, message } => match code.as_str() {
                "INVALID_CREDENTIALS" => PlatformError::InvalidCredentials,
                "TOKEN_EXPIRED" => PlatformError::TokenExpired,
                "INVALID_TOKEN" => PlatformError::InvalidToken { message },
                _ => PlatformError::Unauthorized { message },
            },
            OperationError::Forbidden { message } => PlatformError::Forbidden { message },
            OperationError::Failed { message } => PlatformError::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PlatformError::not_found("User", "1").status(), StatusCode::NOT_FOUND);
        assert_eq!(PlatformError::duplicate("Role", "name", "Admin").status(), StatusCode::CONFLICT);
        assert_eq!(PlatformError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(PlatformError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(PlatformError::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(PlatformError::internal("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_operation_error_conversion() {
        let err: PlatformError = OperationError::conflict("ROLE_NAME_TAKEN", "Role already exists").into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "ROLE_NAME_TAKEN");

        let err: PlatformError = OperationError::invalid_credentials().into();
        assert!(matches!(err, PlatformError::InvalidCredentials));
    }
}
