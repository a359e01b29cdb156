//! Error types for the GestMantIA SDK

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Field name to validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected request body (400)
    #[error("Validation error: {message}")]
    Validation { message: String, fields: FieldErrors },

    /// Missing, invalid or expired credentials (401)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness or state conflict (409)
    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    /// Server error (5xx)
    #[error("Server error: {0}")]
    Server(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation needs a stored token pair and there is none
    #[error("Not signed in")]
    NotSignedIn,

    #[error("{0}")]
    Other(String),
}

/// Error body returned by the API
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: FieldErrors,
}

impl Error {
    /// Build an error from a failed response's status and body text.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_else(|_| ErrorBody {
            message: body.to_string(),
            ..Default::default()
        });

        match status.as_u16() {
            400 | 422 => Error::Validation {
                message: parsed.message,
                fields: parsed.details,
            },
            401 => Error::Authentication(parsed.message),
            403 => Error::Forbidden(parsed.message),
            404 => Error::NotFound(parsed.message),
            409 => Error::Conflict {
                code: parsed.error,
                message: parsed.message,
            },
            500..=599 => Error::Server(parsed.message),
            _ => Error::Other(format!("HTTP {}: {}", status, parsed.message)),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::NotSignedIn)
    }
}
