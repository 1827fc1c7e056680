use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::{auth::gate::enforce, state::AppState};

pub mod handlers;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/booked-sessions",
            get(handlers::list_bookings).post(handlers::book_session),
        )
        .route_layer(from_fn_with_state(state.authenticated(), enforce))
}
