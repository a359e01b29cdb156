//! JSON extractor whose rejections use the platform error body.
//!
//! Bodies that fail to parse answer 400 `VALIDATION_ERROR`, with the
//! offending field under `details` when serde names one.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::debug;

use crate::shared::error::{FieldMessages, PlatformError};

#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(PlatformError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

impl From<JsonRejection> for PlatformError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        debug!(detail = %detail, "Rejected request body");

        let mut fields = FieldMessages::new();
        let message = match rejection {
            JsonRejection::JsonDataError(_) => {
                if let Some((field, reason)) = field_error(&detail) {
                    fields.entry(field).or_default().push(reason);
                }
                "Request body has missing or invalid fields"
            }
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::MissingJsonContentType(_) => "Expected a request with Content-Type: application/json",
            _ => "Request body could not be read",
        };

        PlatformError::Validation {
            message: message.to_string(),
            fields,
        }
    }
}

/// Field and reason from a serde data error such as
/// "...target type: missing field `email` at line 1 column 40" or
/// "...target type: roles: invalid type: string \"x\", expected a sequence at line 1 column 12".
fn field_error(detail: &str) -> Option<(String, String)> {
    let reason = detail.split_once("target type: ").map_or(detail, |(_, r)| r);
    let reason = reason.split(" at line ").next().unwrap_or(reason);

    if let Some(rest) = reason.strip_prefix("missing field `") {
        let name = rest.split('`').next()?;
        return Some((name.to_string(), format!("{} is required", name)));
    }

    let (path, message) = reason.split_once(": ")?;
    if path.is_empty() || path.contains(' ') {
        return None;
    }
    Some((path.to_string(), message.to_string()))
}
