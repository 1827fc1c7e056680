use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::{
    auth::{claims::Role, gate::enforce},
    state::AppState,
};

mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

pub fn router(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/users", post(handlers::register));

    let signed_in = Router::new()
        .route("/users/role/:email", get(handlers::role_of))
        .route_layer(from_fn_with_state(state.authenticated(), enforce));

    let admin = Router::new()
        .route("/users", get(handlers::list_users))
        .route("/users/search", get(handlers::search_users))
        .route("/users/:id", patch(handlers::change_role))
        .route_layer(from_fn_with_state(state.require(Role::Admin), enforce));

    public.merge(signed_in).merge(admin)
}
