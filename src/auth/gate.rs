//! Per-route access control.
//!
//! A [`Pipeline`] runs its gates in the order they were added and stops at
//! the first denial. [`AuthenticatedGate`] turns the bearer header into a
//! [`CredentialClaim`] on the context; [`RoleGate`] then checks the stored
//! role for that claim's email. Routers attach a pipeline with
//! `route_layer(from_fn_with_state(pipeline, enforce))`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::{
    claims::{CredentialClaim, Role},
    error::AuthError,
    jwt::TokenService,
    resolver::IdentityResolver,
};

/// Request-scoped state the gates read and fill in.
pub struct GateContext<'a> {
    pub headers: &'a HeaderMap,
    pub claim: Option<CredentialClaim>,
}

#[async_trait]
pub trait Gate: Send + Sync {
    async fn check(&self, ctx: &mut GateContext<'_>) -> Result<(), AuthError>;
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::HeaderMissing)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::HeaderMissing)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::HeaderMissing);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::HeaderMissing);
    }
    Ok(token)
}

pub struct AuthenticatedGate {
    tokens: Arc<TokenService>,
}

impl AuthenticatedGate {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Gate for AuthenticatedGate {
    async fn check(&self, ctx: &mut GateContext<'_>) -> Result<(), AuthError> {
        let token = bearer_token(ctx.headers)?;
        let claim = self.tokens.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            AuthError::from(e)
        })?;
        ctx.claim = Some(claim);
        Ok(())
    }
}

pub struct RoleGate {
    required: Role,
    resolver: IdentityResolver,
}

impl RoleGate {
    pub fn new(required: Role, resolver: IdentityResolver) -> Self {
        Self { required, resolver }
    }
}

#[async_trait]
impl Gate for RoleGate {
    async fn check(&self, ctx: &mut GateContext<'_>) -> Result<(), AuthError> {
        // Without an authenticated claim there is no identity to look up.
        let email = ctx
            .claim
            .as_ref()
            .map(|c| c.email.as_str())
            .ok_or(AuthError::HeaderMissing)?;
        match self
            .resolver
            .find_by_email(email)
            .await
            .map_err(AuthError::Lookup)?
        {
            Some(user) if user.role == self.required => Ok(()),
            Some(user) => {
                warn!(%email, role = %user.role, required = %self.required, "role mismatch");
                Err(AuthError::RoleMismatch)
            }
            None => {
                warn!(%email, required = %self.required, "no user record for token");
                Err(AuthError::RoleMismatch)
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct Pipeline {
    gates: Vec<Arc<dyn Gate>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }

    /// Runs every gate; returns the claim the gates attached, if any.
    pub async fn run(&self, headers: &HeaderMap) -> Result<Option<CredentialClaim>, AuthError> {
        let mut ctx = GateContext {
            headers,
            claim: None,
        };
        for gate in &self.gates {
            gate.check(&mut ctx).await?;
        }
        Ok(ctx.claim)
    }
}

/// Middleware entry point: runs the pipeline and hands the claim to the
/// handler through request extensions.
pub async fn enforce(
    State(pipeline): State<Pipeline>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(claim) = pipeline.run(req.headers()).await? {
        req.extensions_mut().insert(claim);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::http::HeaderValue;
    use time::{Duration as TimeDuration, OffsetDateTime};

    use super::*;
    use crate::{
        config::JwtConfig,
        users::repo::{MemoryUserStore, UserStore},
    };

    struct Fixture {
        tokens: Arc<TokenService>,
        users: Arc<MemoryUserStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tokens: Arc::new(TokenService::new(&JwtConfig {
                    secret: "gate-secret".into(),
                })),
                users: Arc::new(MemoryUserStore::default()),
            }
        }

        fn authenticated(&self) -> Pipeline {
            Pipeline::new().then(AuthenticatedGate::new(self.tokens.clone()))
        }

        fn require(&self, role: Role) -> Pipeline {
            self.authenticated().then(RoleGate::new(
                role,
                IdentityResolver::new(self.users.clone()),
            ))
        }

        fn bearer_for(&self, email: &str) -> HeaderMap {
            let token = self.tokens.issue(&CredentialClaim::new(email)).unwrap();
            with_auth(&format!("Bearer {token}"))
        }
    }

    fn with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    struct Tripwire(Arc<AtomicBool>);

    #[async_trait]
    impl Gate for Tripwire {
        async fn check(&self, _ctx: &mut GateContext<'_>) -> Result<(), AuthError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn bearer_header_shapes() {
        assert_eq!(bearer_token(&with_auth("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&with_auth("bearer   abc ")).unwrap(), "abc");
        for bad in ["Bearer", "Bearer ", "Token abc", "abc", ""] {
            assert!(
                matches!(bearer_token(&with_auth(bad)), Err(AuthError::HeaderMissing)),
                "{bad:?} should count as a missing header"
            );
        }
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::HeaderMissing)
        ));
    }

    #[tokio::test]
    async fn missing_header_stops_before_later_gates() {
        let fx = Fixture::new();
        let reached = Arc::new(AtomicBool::new(false));
        let pipeline = fx.authenticated().then(Tripwire(reached.clone()));

        let err = pipeline.run(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::HeaderMissing));
        assert!(!reached.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn garbage_token_is_forbidden_not_unauthorized() {
        let fx = Fixture::new();
        let err = fx
            .authenticated()
            .run(&with_auth("Bearer garbage"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Malformed | AuthError::InvalidSignature
        ));
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let fx = Fixture::new();
        let old = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let token = fx
            .tokens
            .issue_at(&CredentialClaim::new("a@x.com"), old)
            .unwrap();
        let err = fx
            .authenticated()
            .run(&with_auth(&format!("Bearer {token}")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn authenticated_gate_attaches_claim() {
        let fx = Fixture::new();
        let claim = fx
            .authenticated()
            .run(&fx.bearer_for("a@x.com"))
            .await
            .unwrap()
            .expect("claim attached");
        assert_eq!(claim.email, "a@x.com");
    }

    #[tokio::test]
    async fn unknown_email_fails_every_role() {
        let fx = Fixture::new();
        let headers = fx.bearer_for("ghost@x.com");
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            let err = fx.require(role).run(&headers).await.unwrap_err();
            assert!(matches!(err, AuthError::RoleMismatch));
        }
    }

    #[tokio::test]
    async fn role_must_match_exactly() {
        let fx = Fixture::new();
        fx.users.put("a@x.com", Role::Teacher).await;
        let headers = fx.bearer_for("a@x.com");

        let claim = fx.require(Role::Teacher).run(&headers).await.unwrap();
        assert_eq!(claim.map(|c| c.email).as_deref(), Some("a@x.com"));

        let err = fx.require(Role::Admin).run(&headers).await.unwrap_err();
        assert!(matches!(err, AuthError::RoleMismatch));
    }

    #[tokio::test]
    async fn role_change_is_seen_by_the_next_check() {
        let fx = Fixture::new();
        let user = fx.users.put("a@x.com", Role::Student).await;
        let headers = fx.bearer_for("a@x.com");
        assert!(fx.require(Role::Admin).run(&headers).await.is_err());

        fx.users.set_role(user.id, Role::Admin).await.unwrap();
        assert!(fx.require(Role::Admin).run(&headers).await.is_ok());
    }

    #[tokio::test]
    async fn role_gate_alone_needs_a_claim() {
        let fx = Fixture::new();
        fx.users.put("a@x.com", Role::Admin).await;
        let pipeline = Pipeline::new().then(RoleGate::new(
            Role::Admin,
            IdentityResolver::new(fx.users.clone()),
        ));
        let err = pipeline.run(&fx.bearer_for("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::HeaderMissing));
    }
}
