//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::ConnectionId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: event type must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`HubError::error_code`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                  |
/// |-----------|--------------------|------------------------------|
/// | 1000–1999 | Validation / Auth  | 400 Bad Request / 401        |
/// | 2000–2999 | Not Found          | 404 Not Found                |
/// | 3000–3999 | Server / Transient | 500 / 502 / 503              |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No resolved identity for the current request or connection.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The transport has no live session for this connection.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// A single delivery to a connection failed.
    #[error("delivery to {connection_id} failed: {reason}")]
    Delivery {
        /// Recipient of the failed delivery.
        connection_id: ConnectionId,
        /// Why the transport rejected the message.
        reason: String,
    },

    /// The history store could not accept an event.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthorized(_) => 1401,
            Self::ConnectionNotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::Delivery { .. } => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Delivery { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for failures that may succeed if retried later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Delivery { .. } | Self::Storage(_))
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
