//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps codec and storage errors to HTTP status codes with a JSON body of
//! error code, message, and details. HSM and database messages are logged,
//! never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use civic_fields::CodecError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "ENCRYPTION_FAILED").
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Entity rejected by field validation (422).
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A sensitive field could not be encrypted, so nothing was stored (502).
    #[error("could not encrypt field {field}")]
    EncryptionFailed { field: String },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::EncryptionFailed { .. } => (StatusCode::BAD_GATEWAY, "ENCRYPTION_FAILED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation {
                field: Some(field), ..
            }
            | Self::EncryptionFailed { field } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        let message = err.to_string();
        match err {
            // The HSM reason was logged by the codec; clients only learn the field.
            CodecError::EncryptionFailed { field, .. } => Self::EncryptionFailed { field },
            CodecError::UnknownField { field, .. } => Self::Validation {
                message,
                field: Some(field),
            },
            CodecError::NotAnObject => Self::Validation {
                message,
                field: None,
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("storage: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_fields::EntityKind;
    use civic_hsm::HsmError;

    #[test]
    fn encryption_failure_is_bad_gateway() {
        let err: AppError = CodecError::EncryptionFailed {
            field: "email".into(),
            source: HsmError::EncryptionFailed {
                reason: "HSM returned 500: key disabled".into(),
            },
        }
        .into();
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "ENCRYPTION_FAILED");
        assert!(!err.to_string().contains("key disabled"));
    }

    #[test]
    fn unknown_field_is_validation_error_with_details() {
        let err: AppError = CodecError::UnknownField {
            kind: EntityKind::Citizen,
            field: "salary".into(),
        }
        .into();
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
        assert_eq!(err.details().unwrap()["field"], "salary");
    }

    #[test]
    fn not_found_status_code() {
        let (status, code) = AppError::NotFound("citizen".into()).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn internal_error_hides_message() {
        let response = AppError::Internal("database locked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
