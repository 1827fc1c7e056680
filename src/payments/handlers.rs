use axum::extract::State;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use super::dto::{
    BookedFromPayment, PaymentIntentRequest, PaymentIntentResponse, PaymentRequest,
    PaymentResponse,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::Json,
    state::AppState,
    store::{to_document, Collection, Document},
};

fn is_valid_intent_id(id: &str) -> bool {
    lazy_static! {
        static ref INTENT_RE: Regex = Regex::new(r"^pi_[A-Za-z0-9_]+$").unwrap();
    }
    INTENT_RE.is_match(id)
}

#[instrument(skip(state, claim, body), fields(email = %claim.email))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Json(body): Json<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, AppError> {
    if body.amount <= 0 {
        return Err(AppError::bad_request("amount must be positive"));
    }
    let intent = state.payments.create_intent(body.amount).await?;
    info!(intent_id = %intent.id, amount = body.amount, "payment intent created");
    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
    }))
}

/// Records a settled payment and books the session it paid for.
#[instrument(skip(state, claim, payment), fields(email = %claim.email))]
pub async fn save_payment(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Json(payment): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    if payment.user_email != claim.email {
        warn!(user_email = %payment.user_email, "payment for another user");
        return Err(AppError::not_owner());
    }
    if !is_valid_intent_id(&payment.transaction_id) {
        return Err(AppError::bad_request("invalid transactionId"));
    }

    let mut filter = Document::new();
    filter.insert(
        "transactionId".into(),
        Value::String(payment.transaction_id.clone()),
    );
    if !state
        .documents
        .find(Collection::Payments, filter)
        .await?
        .is_empty()
    {
        warn!(transaction_id = %payment.transaction_id, "payment replayed");
        return Err(AppError::Conflict("Payment already recorded"));
    }

    let Some(paid) = state.payments.confirm(&payment.transaction_id).await? else {
        warn!(transaction_id = %payment.transaction_id, "payment not settled");
        return Err(AppError::PaymentRequired("Payment not completed".into()));
    };
    if payment.amount.as_i64() != Some(paid) {
        warn!(
            transaction_id = %payment.transaction_id,
            claimed = %payment.amount,
            paid,
            "payment amount differs from the settled intent"
        );
        return Err(AppError::bad_request("amount does not match the payment"));
    }

    let booked = to_document(&BookedFromPayment::from(&payment))?;
    let payment_result = state
        .documents
        .insert(Collection::Payments, to_document(&payment)?)
        .await?;
    let booked_result = match state.documents.insert(Collection::Booked, booked).await {
        Ok(result) => result,
        Err(e) => {
            // Roll back the payment record.
            error!(
                payment_id = %payment_result.inserted_id,
                error = %e,
                "booking failed after payment was recorded"
            );
            if let Err(cleanup) = state
                .documents
                .delete_by_id(Collection::Payments, payment_result.inserted_id)
                .await
            {
                error!(
                    payment_id = %payment_result.inserted_id,
                    error = %cleanup,
                    "orphaned payment record left behind"
                );
            }
            return Err(e.into());
        }
    };

    info!(
        session_id = %payment.session_id,
        transaction_id = %payment.transaction_id,
        "payment recorded and session booked"
    );
    Ok(Json(PaymentResponse {
        payment_result,
        booked_result,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_ids_are_checked_before_reaching_the_provider() {
        assert!(is_valid_intent_id("pi_3Nabc123XYZ"));
        assert!(!is_valid_intent_id("pi_../../v1/customers"));
        assert!(!is_valid_intent_id("ch_123"));
        assert!(!is_valid_intent_id(""));
    }
}
