use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::PaymentConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    /// Smallest currency unit.
    pub amount: i64,
    pub status: String,
}

/// Card-payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in the smallest currency unit (cents).
    async fn create_intent(&self, amount: i64) -> anyhow::Result<PaymentIntent>;
    /// The intent's amount once the provider reports it as paid, `None`
    /// while it is not.
    async fn confirm(&self, intent_id: &str) -> anyhow::Result<Option<i64>>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: Option<String>,
}

/// Stripe's REST API, form-encoded requests with the secret key as bearer.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build payment http client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
        })
    }

    async fn read_intent(resp: reqwest::Response) -> anyhow::Result<PaymentIntent> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| status.to_string());
            anyhow::bail!("payment provider rejected request: {message}");
        }
        resp.json::<PaymentIntent>()
            .await
            .context("decode payment intent")
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self))]
    async fn create_intent(&self, amount: i64) -> anyhow::Result<PaymentIntent> {
        let resp = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.to_string()),
                ("currency", self.currency.clone()),
                ("payment_method_types[]", "card".to_string()),
            ])
            .send()
            .await
            .context("create payment intent")?;
        let intent = Self::read_intent(resp).await?;
        debug!(intent_id = %intent.id, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn confirm(&self, intent_id: &str) -> anyhow::Result<Option<i64>> {
        let resp = self
            .client
            .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("retrieve payment intent")?;
        let intent = Self::read_intent(resp).await?;
        debug!(intent_id = %intent.id, status = %intent.status, "payment intent retrieved");
        Ok((intent.status == "succeeded").then_some(intent.amount))
    }
}

/// Gateway double: hands out sequential intents and treats the ids in
/// `paid` as settled.
#[cfg(test)]
#[derive(Default)]
pub struct FakeGateway {
    pub created: std::sync::Mutex<Vec<i64>>,
    pub paid: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, amount: i64) -> anyhow::Result<PaymentIntent> {
        let mut created = self.created.lock().unwrap();
        created.push(amount);
        let id = format!("pi_fake{}", created.len());
        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
            amount,
            status: "requires_payment_method".into(),
        })
    }

    async fn confirm(&self, intent_id: &str) -> anyhow::Result<Option<i64>> {
        if !self.paid.lock().unwrap().iter().any(|id| id == intent_id) {
            return Ok(None);
        }
        let created = self.created.lock().unwrap();
        Ok(created
            .iter()
            .enumerate()
            .find(|(n, _)| format!("pi_fake{}", n + 1) == intent_id)
            .map(|(_, amount)| *amount))
    }
}
