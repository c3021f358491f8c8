/*
 * Responsibility
 * - AppError: the only error type handlers and middleware return
 * - IntoResponse: status + minimal JSON body, never internal detail
 * - Conversions from service errors (token, credential, role check)
 */
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::credentials::CredentialError;
use crate::services::auth::error::TokenError;
use crate::services::auth::principal::AccessDenied;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = ErrorResponseBody {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::RefreshRejected(_) => AppError::Unauthorized,
            TokenError::Signing(_) | TokenError::TtlOutOfRange => AppError::Internal,
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::BadCredentials | CredentialError::UnknownSubject => {
                AppError::Unauthorized
            }
            CredentialError::Unavailable(reason) => {
                tracing::error!(%reason, "credential store unavailable");
                AppError::Internal
            }
        }
    }
}

/// Parser details stay in the logs.
impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        tracing::debug!(status = %e.status(), error = %e.body_text(), "request body rejected");
        AppError::InvalidRequest("malformed request body".to_string())
    }
}

impl From<AccessDenied> for AppError {
    fn from(_: AccessDenied) -> Self {
        AppError::Forbidden
    }
}
