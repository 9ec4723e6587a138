//! JSON response envelope and the single translation of [`AppError`] into
//! HTTP responses.
//!
//! Every response body has the shape:
//! ```json
//! { "success": true, "data": { ... }, "message": "optional" }
//! ```
//! Failures set `success` to `false` and carry a `message`; a 403 also
//! carries `data.required_roles` and `data.user_role`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::policy;
use crate::error::{AppError, ErrorKind};

/// Message returned in place of server error details in release builds.
pub const GENERIC_SERVER_ERROR: &str = "internal server error";

/// Success envelope.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Envelope<T> {
    /// Always `true` for this type.
    pub success: bool,
    /// Payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Envelope carrying `data`.
    pub const fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Adds a message to the envelope.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope<()> {
    /// Envelope with a message and no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Envelope with only a message, as returned by deletions and logout.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageEnvelope {
    /// `true`.
    pub success: bool,
    /// What happened.
    pub message: String,
}

/// Failure envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    /// Always `false`.
    pub success: bool,
    /// What went wrong.
    pub message: String,
    /// Extra context; present on 403 responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict | ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> ErrorEnvelope {
        let (message, data) = match self {
            Self::Forbidden { action, role } => (
                "insufficient permissions".to_string(),
                Some(json!({
                    "required_roles": policy::required_roles(*action),
                    "user_role": role,
                })),
            ),
            Self::Server(_) if !cfg!(debug_assertions) => (GENERIC_SERVER_ERROR.to_string(), None),
            other => (other.to_string(), None),
        };
        ErrorEnvelope {
            success: false,
            message,
            data,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Server(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Role};

    #[test]
    fn status_codes_follow_kind() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("incident".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidState("done".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Server("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn forbidden_discloses_required_roles() {
        let err = AppError::Forbidden {
            action: Action::TogglePublish,
            role: Role::Engineer,
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let body = serde_json::to_value(err.envelope()).ok();
        let expected = json!({
            "success": false,
            "message": "insufficient permissions",
            "data": { "required_roles": ["admin"], "user_role": "engineer" },
        });
        assert_eq!(body, Some(expected));
    }

    #[test]
    fn success_envelope_omits_missing_fields() {
        let body = serde_json::to_value(Envelope::data(3)).ok();
        assert_eq!(body, Some(json!({ "success": true, "data": 3 })));
        let body = serde_json::to_value(Envelope::message("gone")).ok();
        assert_eq!(body, Some(json!({ "success": true, "message": "gone" })));
    }
}
