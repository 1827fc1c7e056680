use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{
    claims::Role,
    gate::{AuthenticatedGate, Pipeline, RoleGate},
    jwt::TokenService,
    resolver::IdentityResolver,
};
use crate::config::{AppConfig, JwtConfig};
use crate::payments::gateway::{PaymentGateway, StripeGateway};
use crate::store::{DocumentStore, PgDocumentStore};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Wires the Postgres-backed stores and the card-payment provider.
    pub fn init(config: &AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let payments = Arc::new(StripeGateway::new(&config.payments)?) as Arc<dyn PaymentGateway>;
        Ok(Self::from_parts(
            &config.jwt,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgDocumentStore::new(db)),
            payments,
        ))
    }

    pub fn from_parts(
        jwt: &JwtConfig,
        users: Arc<dyn UserStore>,
        documents: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            tokens: Arc::new(TokenService::new(jwt)),
            users,
            documents,
            payments,
        }
    }

    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(self.users.clone())
    }

    /// Valid bearer token required.
    pub fn authenticated(&self) -> Pipeline {
        Pipeline::new().then(AuthenticatedGate::new(self.tokens.clone()))
    }

    /// Valid bearer token and a stored role equal to `role`.
    pub fn require(&self, role: Role) -> Pipeline {
        self.authenticated()
            .then(RoleGate::new(role, self.resolver()))
    }
}

#[cfg(test)]
pub(crate) struct Fakes {
    pub users: Arc<crate::users::repo::MemoryUserStore>,
    pub documents: Arc<crate::store::MemoryDocumentStore>,
    pub payments: Arc<crate::payments::gateway::FakeGateway>,
}

#[cfg(test)]
impl AppState {
    pub(crate) fn fake() -> (Self, Fakes) {
        let fakes = Fakes {
            users: Arc::default(),
            documents: Arc::default(),
            payments: Arc::default(),
        };
        let state = Self::from_parts(
            &JwtConfig {
                secret: "test-secret".into(),
            },
            fakes.users.clone(),
            fakes.documents.clone(),
            fakes.payments.clone(),
        );
        (state, fakes)
    }
}
