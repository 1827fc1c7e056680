use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::CredentialClaim;
use crate::{config::JwtConfig, state::AppState};

/// Fixed token lifetime. Tokens cannot be revoked, so this bounds how long a
/// leaked token stays usable; it is not configurable.
pub const TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Fields the token payload owns; a claim may not carry them itself.
const RESERVED_FIELDS: [&str; 3] = ["email", "iat", "exp"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("claim field `{0}` is reserved")]
    ReservedClaim(&'static str),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// What actually goes on the wire: the caller's claim plus timestamps.
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(flatten)]
    claim: CredentialClaim,
    iat: i64,
    exp: i64,
}

/// Issues and verifies HS256 identity tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: TOKEN_TTL,
        }
    }

    pub fn issue(&self, claim: &CredentialClaim) -> Result<String, TokenError> {
        self.issue_at(claim, OffsetDateTime::now_utc())
    }

    /// Signs `claim` as if issued at `now`. Same claim and instant give the
    /// same token.
    pub fn issue_at(
        &self,
        claim: &CredentialClaim,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        if let Some(field) = RESERVED_FIELDS
            .iter()
            .find(|f| claim.extra.contains_key(**f))
        {
            return Err(TokenError::ReservedClaim(*field));
        }
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let payload = TokenPayload {
            claim: claim.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(email = %claim.email, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<CredentialClaim, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        let data = decode::<TokenPayload>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.claim.email, "jwt verified");
        Ok(data.claims.claim)
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_service(secret: &str) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: secret.into(),
        })
    }

    #[test]
    fn issue_and_verify_returns_same_claim() {
        let tokens = make_service("dev-secret");
        let claim = CredentialClaim::new("a@x.com")
            .with("name", "Ann")
            .with("photo", json!({ "url": "https://img/a.png" }));
        let token = tokens.issue(&claim).expect("issue");
        let back = tokens.verify(&token).expect("verify");
        assert_eq!(back, claim);
    }

    #[test]
    fn issuing_is_deterministic_for_same_instant() {
        let tokens = make_service("dev-secret");
        let claim = CredentialClaim::new("a@x.com");
        let now = OffsetDateTime::now_utc();
        assert_eq!(
            tokens.issue_at(&claim, now).unwrap(),
            tokens.issue_at(&claim, now).unwrap()
        );
    }

    #[test]
    fn token_older_than_an_hour_is_expired() {
        let tokens = make_service("dev-secret");
        let claim = CredentialClaim::new("a@x.com");
        let issued = OffsetDateTime::now_utc() - TimeDuration::minutes(61);
        let token = tokens.issue_at(&claim, issued).unwrap();
        assert_eq!(tokens.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn token_inside_the_window_still_verifies() {
        let tokens = make_service("dev-secret");
        let claim = CredentialClaim::new("a@x.com");
        let issued = OffsetDateTime::now_utc() - TimeDuration::minutes(55);
        let token = tokens.issue_at(&claim, issued).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), claim);
    }

    #[test]
    fn other_secret_is_invalid_signature() {
        let token = make_service("one")
            .issue(&CredentialClaim::new("a@x.com"))
            .unwrap();
        let err = make_service("two").verify(&token).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn swapped_payload_is_invalid_signature() {
        let tokens = make_service("dev-secret");
        let a = tokens.issue(&CredentialClaim::new("a@x.com")).unwrap();
        let b = tokens.issue(&CredentialClaim::new("admin@x.com")).unwrap();
        let a_parts: Vec<&str> = a.split('.').collect();
        let b_parts: Vec<&str> = b.split('.').collect();
        let forged = format!("{}.{}.{}", a_parts[0], b_parts[1], a_parts[2]);
        assert_eq!(
            tokens.verify(&forged).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = make_service("dev-secret");
        assert_eq!(tokens.verify("garbage").unwrap_err(), TokenError::Malformed);
        assert_eq!(tokens.verify("").unwrap_err(), TokenError::Malformed);
        assert_eq!(
            tokens.verify("a.b.c").unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn reserved_fields_are_refused() {
        let tokens = make_service("dev-secret");
        let claim = CredentialClaim::new("a@x.com").with("exp", 1);
        assert_eq!(
            tokens.issue(&claim).unwrap_err(),
            TokenError::ReservedClaim("exp")
        );
    }
}
