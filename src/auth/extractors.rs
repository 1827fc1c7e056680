use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde_json::Value;

use super::{claims::CredentialClaim, error::AuthError};
use crate::{error::AppError, store::Document};

/// The verified claim of the caller, as attached by [`super::gate::enforce`].
pub struct AuthUser(pub CredentialClaim);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present when a gate ran in front of the handler.
        parts
            .extensions
            .get::<CredentialClaim>()
            .cloned()
            .map(AuthUser)
            .ok_or(AuthError::HeaderMissing)
    }
}

impl AuthUser {
    /// Fills `field` with the caller's email, or refuses a document that
    /// names somebody else there.
    pub fn stamp_owner(&self, doc: &mut Document, field: &str) -> Result<(), AppError> {
        match doc.get(field) {
            None | Some(Value::Null) => {
                doc.insert(field.to_string(), Value::String(self.0.email.clone()));
                Ok(())
            }
            Some(Value::String(owner)) if *owner == self.0.email => Ok(()),
            Some(_) => Err(AppError::not_owner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stamp_owner_fills_or_checks_the_field() {
        let caller = AuthUser(CredentialClaim::new("t@x.com"));

        let mut blank = Document::new();
        caller.stamp_owner(&mut blank, "tutorEmail").unwrap();
        assert_eq!(blank["tutorEmail"], json!("t@x.com"));

        let mut own = Document::new();
        own.insert("tutorEmail".into(), json!("t@x.com"));
        assert!(caller.stamp_owner(&mut own, "tutorEmail").is_ok());

        let mut other = Document::new();
        other.insert("tutorEmail".into(), json!("z@x.com"));
        assert!(matches!(
            caller.stamp_owner(&mut other, "tutorEmail"),
            Err(AppError::Forbidden(_))
        ));
    }
}
