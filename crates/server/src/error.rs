//! API error type.
//!
//! Every handler returns `Result<T, ApiError>`. Errors are rendered as
//! `{ "message": ... }` with a matching status; server errors are captured to
//! Sentry before responding and their details are never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error returned by cart API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No bearer token, or one the server did not issue.
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid token, but not for the requested cart, or a missing anti-forgery token.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Variant rejected by the catalog.
    #[error("Invalid variant")]
    InvalidVariant,

    /// Request is well-formed but cannot be applied.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidVariant | Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::Forbidden(msg) | Self::Unprocessable(msg) => msg.clone(),
            Self::Unauthorized => "Sign in to access this cart".to_string(),
            Self::InvalidVariant => "Invalid variant".to_string(),
            // Don't expose internal error details to clients
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorBody {
            message: self.client_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;
