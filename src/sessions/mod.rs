use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};

use crate::{
    auth::{claims::Role, gate::enforce},
    state::AppState,
};

mod dto;
pub mod handlers;

pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:id", get(handlers::get_session));

    let tutor = Router::new()
        .route("/create-sessions", post(handlers::create_session))
        .route("/sessions/tutor/:email", get(handlers::tutor_sessions))
        .route_layer(from_fn_with_state(state.require(Role::Teacher), enforce));

    let admin = Router::new()
        .route("/sessions/approval/:id", patch(handlers::approve_session))
        .route("/sessions/:id/status", patch(handlers::update_status))
        .route("/sessions/:id", delete(handlers::delete_session))
        .route_layer(from_fn_with_state(state.require(Role::Admin), enforce));

    public.merge(tutor).merge(admin)
}
