use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod error;
pub(crate) mod extractors;
pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod resolver;

pub fn router() -> Router<AppState> {
    handlers::token_routes()
}
