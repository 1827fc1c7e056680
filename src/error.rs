use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Every error response carries a single human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn response(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(ErrorBody {
                message: message.into(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Caller is signed in but is acting on someone else's data.
    pub fn not_owner() -> Self {
        Self::Forbidden("Forbidden access")
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => ErrorBody::response(StatusCode::BAD_REQUEST, message),
            AppError::Forbidden(message) => ErrorBody::response(StatusCode::FORBIDDEN, message),
            AppError::PaymentRequired(message) => {
                ErrorBody::response(StatusCode::PAYMENT_REQUIRED, message)
            }
            AppError::Conflict(message) => ErrorBody::response(StatusCode::CONFLICT, message),
            AppError::Internal(e) => {
                error!(error = %e, "request failed");
                ErrorBody::response(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        }
    }
}
