use axum::extract::State;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{Json, Query},
    state::AppState,
    store::{timestamp, Collection, Document, InsertSummary},
};

#[derive(Debug, Deserialize)]
pub struct BookedQuery {
    pub email: Option<String>,
}

/// Books a free session for the caller.
#[instrument(skip(state, caller, booking), fields(email = %caller.0.email))]
pub async fn book_session(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(mut booking): Json<Document>,
) -> Result<Json<InsertSummary>, AppError> {
    caller.stamp_owner(&mut booking, "userEmail")?;
    booking.entry("date").or_insert(timestamp()?);
    let result = state.documents.insert(Collection::Booked, booking).await?;
    info!(booking_id = %result.inserted_id, "session booked");
    Ok(Json(result))
}

#[instrument(skip(state, claim), fields(email = %claim.email))]
pub async fn list_bookings(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Query(q): Query<BookedQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let email = q.email.unwrap_or_else(|| claim.email.clone());
    if email != claim.email {
        return Err(AppError::not_owner());
    }
    let mut filter = Document::new();
    filter.insert("userEmail".into(), Value::String(email));
    let bookings = state.documents.find(Collection::Booked, filter).await?;
    Ok(Json(bookings))
}
