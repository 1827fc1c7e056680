use std::sync::Arc;

use axum::{extract::State, routing::post, Router};
use serde::Serialize;
use tracing::{info, instrument};

use super::{
    claims::CredentialClaim,
    jwt::{TokenError, TokenService},
};
use crate::{
    error::AppError,
    extract::Json,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub fn token_routes() -> Router<AppState> {
    Router::new().route("/jwt", post(issue_token))
}

/// Signs whatever identity the caller's login flow hands over.
#[instrument(skip(tokens, claim), fields(email = %claim.email))]
pub async fn issue_token(
    State(tokens): State<Arc<TokenService>>,
    Json(claim): Json<CredentialClaim>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = tokens.issue(&claim).map_err(|e| match e {
        TokenError::ReservedClaim(_) => AppError::bad_request(e.to_string()),
        other => AppError::Internal(other.into()),
    })?;
    info!("token issued");
    Ok(Json(TokenResponse { token }))
}
