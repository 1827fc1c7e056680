use axum::extract::State;
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{check_fee, ApprovalRequest, SessionStatus, StatusRequest};
use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{Json, Path},
    state::AppState,
    store::{
        timestamp, to_document, Collection, DeleteSummary, Document, InsertSummary, UpdateSummary,
    },
};

#[instrument(skip(state))]
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    let sessions = state
        .documents
        .find(Collection::Sessions, Document::new())
        .await?;
    Ok(Json(sessions))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Document>>, AppError> {
    let session = state.documents.find_by_id(Collection::Sessions, id).await?;
    Ok(Json(session))
}

/// New sessions start out pending until an admin reviews them.
#[instrument(skip(state, caller, session), fields(email = %caller.0.email))]
pub async fn create_session(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(mut session): Json<Document>,
) -> Result<Json<InsertSummary>, AppError> {
    caller.stamp_owner(&mut session, "tutorEmail")?;
    session
        .entry("status")
        .or_insert(json!(SessionStatus::Pending));
    session.insert("createdAt".into(), timestamp()?);
    let result = state.documents.insert(Collection::Sessions, session).await?;
    info!(session_id = %result.inserted_id, "session created");
    Ok(Json(result))
}

#[instrument(skip(state, claim), fields(caller = %claim.email))]
pub async fn tutor_sessions(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    if email != claim.email {
        return Err(AppError::not_owner());
    }
    let mut filter = Document::new();
    filter.insert("tutorEmail".into(), Value::String(email));
    let sessions = state.documents.find(Collection::Sessions, filter).await?;
    Ok(Json(sessions))
}

#[instrument(skip(state, body))]
pub async fn approve_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApprovalRequest>,
) -> Result<Json<UpdateSummary>, AppError> {
    check_fee(body.session_type, &body.amount).map_err(AppError::bad_request)?;
    let mut patch = to_document(&json!({
        "type": body.session_type,
        "amount": body.amount,
    }))?;
    patch.insert("updatedAt".into(), timestamp()?);
    let result = state
        .documents
        .update_by_id(Collection::Sessions, id, patch)
        .await?;
    info!(matched = result.matched_count, "session approval details updated");
    Ok(Json(result))
}

#[instrument(skip(state, body))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<UpdateSummary>, AppError> {
    if let (Some(session_type), Some(amount)) = (body.session_type, body.amount.as_ref()) {
        check_fee(session_type, amount).map_err(AppError::bad_request)?;
    }
    let mut patch = to_document(&json!({ "status": body.status }))?;
    if let Some(session_type) = body.session_type {
        patch.insert("type".into(), json!(session_type));
    }
    if let Some(amount) = body.amount {
        patch.insert("amount".into(), Value::Number(amount));
    }
    patch.insert("updatedAt".into(), timestamp()?);
    let result = state
        .documents
        .update_by_id(Collection::Sessions, id, patch)
        .await?;
    info!(status = ?body.status, matched = result.matched_count, "session status updated");
    Ok(Json(result))
}

#[instrument(skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteSummary>, AppError> {
    let result = state
        .documents
        .delete_by_id(Collection::Sessions, id)
        .await?;
    info!(deleted = result.deleted_count, "session deleted");
    Ok(Json(result))
}
