use axum::{middleware::from_fn_with_state, routing::{get, post}, Router};

use crate::{
    auth::{claims::Role, gate::enforce},
    state::AppState,
};

pub mod handlers;

/// `GET /materials/:id` takes the calling tutor's email in the `:id` slot; the path is
/// shared with the id-based delete and update routes.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/materials", post(handlers::create_material))
        .route(
            "/materials/:id",
            get(handlers::tutor_materials)
                .delete(handlers::delete_material)
                .patch(handlers::update_material),
        )
        .route_layer(from_fn_with_state(state.require(Role::Teacher), enforce))
}
