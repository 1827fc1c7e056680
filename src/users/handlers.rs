use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ExistingUser, RegisterRequest, RoleChange, SearchQuery},
    repo_types::{NewUser, Registration, UserRecord},
};
use crate::{
    auth::claims::Role,
    error::AppError,
    extract::{Json, Path, Query},
    state::AppState,
    store::{InsertSummary, UpdateSummary},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registers an email on first sign-in. Repeat calls are harmless and hand
/// back the stored record.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }

    let role = payload.role.unwrap_or_default();
    if role == Role::Admin {
        warn!(email = %payload.email, "refused admin self-registration");
        return Err(AppError::Forbidden("Forbidden"));
    }

    let registration = state
        .users
        .register(NewUser {
            email: payload.email,
            name: payload.name,
            role,
        })
        .await?;

    Ok(match registration {
        Registration::Created(user) => {
            info!(user_id = %user.id, role = %user.role, "user registered");
            Json(InsertSummary {
                inserted_id: user.id,
            })
            .into_response()
        }
        Registration::Existing(user) => Json(ExistingUser {
            message: "User already exists",
            existing_user: user,
        })
        .into_response(),
    })
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserRecord>>, AppError> {
    Ok(Json(state.users.list().await?))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<UserRecord>>, AppError> {
    let text = q.query.as_deref().unwrap_or_default().trim();
    let users = if text.is_empty() {
        state.users.list().await?
    } else {
        state.users.search(text).await?
    };
    Ok(Json(users))
}

/// The stored record for an email, or `null` when it was never registered.
#[instrument(skip(state))]
pub async fn role_of(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Option<UserRecord>>, AppError> {
    Ok(Json(state.users.find_by_email(&email).await?))
}

#[instrument(skip(state))]
pub async fn change_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleChange>,
) -> Result<Json<UpdateSummary>, AppError> {
    let result = state.users.set_role(id, body.role).await?;
    info!(%id, role = %body.role, modified = result.modified_count, "role changed");
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ann@example.com"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example.com"));
        assert!(!is_valid_email(""));
    }
}
