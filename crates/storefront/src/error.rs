//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`. Error bodies are JSON: `{"error": "...", ...}`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::cart::{CartServiceError, RejectedLine, StoreError};

/// Seconds a client should wait before retrying when the store is down.
pub const RETRY_AFTER_SECS: u32 = 5;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartServiceError),

    /// No route matches the request path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected_line: Option<&'a RejectedLine>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => match err {
                CartServiceError::InvalidLine(_) | CartServiceError::TooManyLines { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CartServiceError::Store(StoreError::Unavailable(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CartServiceError::Store(StoreError::VersionConflict { .. })
                | CartServiceError::Contended { .. } => StatusCode::CONFLICT,
                CartServiceError::Store(StoreError::DataCorruption(_))
                | CartServiceError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Cart(err) => match err {
                CartServiceError::Store(StoreError::Unavailable(_)) => {
                    "Cart storage is temporarily unavailable".to_string()
                }
                CartServiceError::Store(StoreError::VersionConflict { .. })
                | CartServiceError::Contended { .. } => {
                    "Cart was modified concurrently, please retry".to_string()
                }
                CartServiceError::Store(StoreError::DataCorruption(_))
                | CartServiceError::Encode(_) => "Internal server error".to_string(),
                CartServiceError::InvalidLine(_) | CartServiceError::TooManyLines { .. } => {
                    err.to_string()
                }
            },
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::CONFLICT {
            tracing::warn!(error = %self, "Cart sync gave up after conflicts");
        }

        let message = self.public_message();
        let rejected_line = match &self {
            Self::Cart(CartServiceError::InvalidLine(line)) => Some(line),
            _ => None,
        };
        let body = ErrorBody {
            error: &message,
            rejected_line,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
