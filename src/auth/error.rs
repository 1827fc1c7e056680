use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::jwt::TokenError;
use crate::error::ErrorBody;

/// Why a gate refused a request.
///
/// A missing or empty bearer header is a 401; everything after a token was
/// presented is a 403 with the same generic body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing or has no token")]
    HeaderMissing,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("caller does not hold the required role")]
    RoleMismatch,
    #[error("identity lookup failed")]
    Lookup(#[source] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::HeaderMissing => StatusCode::UNAUTHORIZED,
            AuthError::Malformed
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::RoleMismatch => StatusCode::FORBIDDEN,
            AuthError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthError::HeaderMissing => "Unauthorized access",
            AuthError::Lookup(_) => "Server error",
            _ => "Forbidden",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::Expired,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            _ => AuthError::Malformed,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Lookup(e) = &self {
            tracing::error!(error = %e, "role lookup failed");
        }
        ErrorBody::response(self.status(), self.message())
    }
}
