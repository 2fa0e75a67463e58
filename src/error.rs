// SPDX-License-Identifier: Apache-2.0

//! Error types for the story backend.
//!
//! User-facing messages are German and deliberately vague about internals:
//! storage/library failures are logged with context at the workflow boundary
//! and surface here only as their category. A wrong token and a missing token
//! hash both map to `Forbidden` so callers learn nothing about which check
//! failed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or length; the message is already user-facing German.
    #[error("{0}")]
    Validation(String),

    /// Slug or id has no matching row.
    #[error("Geschichte nicht gefunden")]
    NotFound,

    /// Token present but does not grant access to this story.
    #[error("Kein Zugriff auf diese Geschichte")]
    Forbidden,

    /// Too many attempts from one identifier.
    #[error("Zu viele Versuche. Bitte versuche es später erneut.")]
    RateLimited {
        /// Seconds until the window resets
        retry_after_secs: u64,
    },

    /// The persistence layer failed; retryable from the caller's view.
    #[error("Etwas ist schiefgelaufen. Bitte versuche es erneut.")]
    Database(#[from] sqlx::Error),

    /// Anything else that must not leak detail to the client.
    #[error("Etwas ist schiefgelaufen. Bitte versuche es erneut.")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    /// Stable machine-readable code for the client.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Database(_) => "STORAGE",
            Self::Internal(_) => "STORAGE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Internals get logged where they happen; here only the category and
        // the safe message leave the process.
        let retry_after_secs = match &self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
            retry_after_secs,
        };

        let mut response = (self.status(), Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
