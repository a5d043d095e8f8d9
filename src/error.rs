// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types rendered in the callable-function error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("You must be logged in to delete your account.")]
    Unauthenticated,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Account deletion failed downstream; the detail is only logged.
    #[error("Error deleting account: {0}")]
    DeletionFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, status, message) = match &self {
            AppError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", self.to_string())
            }
            AppError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, "PERMISSION_DENIED", msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg.clone())
            }
            AppError::DeletionFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Error deleting account".to_string(),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal error".to_string(),
                )
            }
            AppError::Identity(msg) => {
                tracing::error!(error = %msg, "Identity provider error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal error".to_string(),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal error".to_string(),
                )
            }
        };

        (
            code,
            Json(ErrorResponse {
                error: ErrorBody { status, message },
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_failed_hides_detail() {
        let err = AppError::DeletionFailed("commit aborted: quota exceeded".to_string());
        assert!(err.to_string().contains("quota exceeded"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::PermissionDenied("nope".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
