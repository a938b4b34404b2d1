//! Application Error Types
//!
//! Closed error taxonomy with a uniform wire shape and Axum integration.
//!
//! Every [`AppError`] variant carries a fixed HTTP status; callers only ever
//! supply the message. Handlers return [`HandlerError`], which serializes the
//! errors it recognizes and sends everything else down the default 500 path.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Application error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Validation(String),
}

/// Value of the `status` field of every serialized error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStatus {
    Error,
}

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedError {
    pub message: String,
    pub status: ErrorStatus,
    pub status_code: u16,
}

impl AppError {
    /// Fixed HTTP status of the variant
    pub const fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::Validation(msg) => msg,
        }
    }

    /// Wire representation of the error. Pure; repeated calls are equal.
    pub fn serialize(&self) -> SerializedError {
        SerializedError {
            message: self.message().to_owned(),
            status: ErrorStatus::Error,
            status_code: self.status_code().as_u16(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = self.serialize();
        tracing::error!(
            status_code = body.status_code,
            message = %body.message,
            "Request failed"
        );
        (self.status_code(), Json(body)).into_response()
    }
}

/// Error returned by route handlers.
///
/// Anything convertible into `anyhow::Error` can be raised with `?`. Only
/// [`AppError`] is serialized into the stable shape; other errors are logged
/// and answered with a bare `500` so no internal detail leaks to clients.
#[derive(Debug)]
pub struct HandlerError(anyhow::Error);

impl HandlerError {
    /// The wrapped error, when it is one the error stage recognizes
    pub fn as_app_error(&self) -> Option<&AppError> {
        self.0.downcast_ref::<AppError>()
    }
}

impl<E> From<E> for HandlerError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self.0.downcast::<AppError>() {
            Ok(err) => err.into_response(),
            Err(other) => unhandled(other),
        }
    }
}

fn unhandled(err: anyhow::Error) -> Response {
    tracing::error!(error = ?err, "Unhandled error");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
