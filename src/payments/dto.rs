use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::store::{Document, InsertSummary};

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

/// A completed card payment for one session, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub user_email: String,
    pub session_id: String,
    pub session_title: Option<String>,
    pub amount: Number,
    pub transaction_id: String,
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Document,
}

/// Booking record derived from a payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedFromPayment<'a> {
    pub user_email: &'a str,
    pub session_id: &'a str,
    pub session_title: Option<&'a str>,
    pub amount: &'a Number,
    pub transaction_id: &'a str,
    pub date: Option<&'a str>,
}

impl<'a> From<&'a PaymentRequest> for BookedFromPayment<'a> {
    fn from(p: &'a PaymentRequest) -> Self {
        Self {
            user_email: &p.user_email,
            session_id: &p.session_id,
            session_title: p.session_title.as_deref(),
            amount: &p.amount,
            transaction_id: &p.transaction_id,
            date: p.date.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment_result: InsertSummary,
    pub booked_result: InsertSummary,
}
