//! Server error types and the error-to-response translation.

use std::sync::OnceLock;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::schemas::FieldErrors;
use crate::store::StoreError;

/// Server error type. Every handler failure is funneled through here and
/// mapped to an HTTP status by a fixed table.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid request input, with optional field-level details.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Creates a validation error without details.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a validation error carrying field-level details.
    pub fn validation_failed(errors: FieldErrors) -> Self {
        Self::Validation {
            message: "Validation failed".to_string(),
            details: serde_json::to_value(errors).ok(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

/// Whether responses may carry error internals. Set once from
/// `Config::is_production` when the application state is created; defaults
/// to exposing (development behavior) if never set.
static EXPOSE_INTERNALS: OnceLock<bool> = OnceLock::new();

/// Records the deployment mode for error rendering. Later calls are no-ops.
pub fn set_expose_internals(expose: bool) {
    let _ = EXPOSE_INTERNALS.set(expose);
}

fn expose_internals() -> bool {
    *EXPOSE_INTERNALS.get_or_init(|| true)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let expose = expose_internals();

        let (status, message, details) = match &self {
            ApiError::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, message.clone(), details.clone())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone(), None),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                let message = if expose {
                    e.to_string()
                } else {
                    "Internal Server Error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let message = if expose {
                    msg.clone()
                } else {
                    "Internal Server Error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message, None)
            }
        };

        let mut error = json!({ "message": message });
        if let Some(details) = details {
            error["details"] = details;
        }
        if expose {
            error["stack"] = json!(format!("{self:?}"));
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type alias for handler operations.
pub type ApiResult<T> = Result<T, ApiError>;
