use axum::{middleware::from_fn_with_state, routing::post, Router};

use crate::{auth::gate::enforce, state::AppState};

mod dto;
pub mod gateway;
pub mod handlers;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/create-payment-intent", post(handlers::create_payment_intent))
        .route("/payments", post(handlers::save_payment))
        .route_layer(from_fn_with_state(state.authenticated(), enforce))
}
