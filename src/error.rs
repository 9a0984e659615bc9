// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// HTTP status and stable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Store(StoreError::MissingId { .. }) => (StatusCode::BAD_REQUEST, "missing_id"),
            AppError::Store(StoreError::InvalidKey { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_key")
            }
            AppError::Store(StoreError::PermissionDenied(_)) => {
                (StatusCode::FORBIDDEN, "permission_denied")
            }
            AppError::Store(_) => (StatusCode::BAD_GATEWAY, "database_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();

        let details = match &self {
            AppError::BadRequest(msg) => Some(msg.clone()),
            AppError::Store(err) if err.is_precondition() => Some(err.to_string()),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Database error");
                None
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
