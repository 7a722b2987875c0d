//! API error type and its HTTP rendering.
//!
//! Every failure leaves the service as `{"msg": ..., "error": <code>}`. The
//! code distinguishes expired, invalid and missing tokens so a client can tell
//! when to call `/refresh`. Store and internal failures are logged in full and
//! answered with a generic message.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::jwt::TokenError;
use crate::database::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Content-Type application/json is required")]
    InvalidContentType,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Access token rejected: {0}")]
    AccessToken(TokenError),
    #[error("Refresh token rejected: {0}")]
    RefreshToken(TokenError),
    #[error("Role '{required}' is required")]
    Forbidden { required: String },
    #[error("{0}")]
    NotFound(String),
    #[error("At most {max} requests per {window:?}")]
    RateLimited { max: usize, window: Duration },
    #[error("Internal server error")]
    Store(#[from] StoreError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Wire shape of every error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub msg: String,
    pub error: String,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidContentType => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::AccessToken(_) | Self::RefreshToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidContentType => "invalid_content_type",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccessToken(TokenError::Missing) => "authorization_required",
            Self::AccessToken(TokenError::Expired) => "token_expired",
            Self::AccessToken(TokenError::Invalid | TokenError::WrongKind) => "invalid_token",
            Self::RefreshToken(TokenError::Missing) => "missing_refresh_token",
            Self::RefreshToken(_) => "invalid_refresh_token",
            Self::Forbidden { .. } => "insufficient_permissions",
            Self::NotFound(_) => "not_found",
            Self::RateLimited { .. } => "too_many_requests",
            Self::Store(_) | Self::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::AccessToken(TokenError::Missing) => "Authorization token required".to_string(),
            Self::AccessToken(TokenError::Expired) => "Token has expired".to_string(),
            Self::AccessToken(_) => "Invalid token".to_string(),
            Self::RefreshToken(TokenError::Missing) => "Refresh token not found".to_string(),
            Self::RefreshToken(_) => "Refresh token invalid or expired".to_string(),
            Self::RateLimited { max, window } => {
                format!("Maximum {} requests per {} seconds", max, window.as_secs())
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Store(e) => tracing::error!(error = ?e, "store failure"),
            Self::Internal(e) => tracing::error!(error = ?e, "internal failure"),
            other => tracing::debug!(status = %status, code = other.code(), "request rejected"),
        }

        let body = ErrorResponse {
            msg: self.message(),
            error: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
