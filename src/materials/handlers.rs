use axum::extract::State;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{Json, Path},
    state::AppState,
    store::{timestamp, Collection, DeleteSummary, Document, InsertSummary, UpdateSummary},
};

/// Checks a material was uploaded by `email`. `false` when there is no such
/// material.
async fn owns_material(state: &AppState, id: Uuid, email: &str) -> Result<bool, AppError> {
    let Some(material) = state.documents.find_by_id(Collection::Materials, id).await? else {
        return Ok(false);
    };
    match material.get("tutorEmail") {
        Some(Value::String(owner)) if owner == email => Ok(true),
        _ => {
            warn!(%id, caller = %email, "material belongs to another tutor");
            Err(AppError::not_owner())
        }
    }
}

#[instrument(skip(state, caller, material), fields(email = %caller.0.email))]
pub async fn create_material(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(mut material): Json<Document>,
) -> Result<Json<InsertSummary>, AppError> {
    caller.stamp_owner(&mut material, "tutorEmail")?;
    material.insert("createdAt".into(), timestamp()?);
    let result = state
        .documents
        .insert(Collection::Materials, material)
        .await?;
    info!(material_id = %result.inserted_id, "material uploaded");
    Ok(Json(result))
}

/// Materials uploaded by the calling tutor.
#[instrument(skip(state, claim), fields(caller = %claim.email))]
pub async fn tutor_materials(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    if email != claim.email {
        return Err(AppError::not_owner());
    }
    let mut filter = Document::new();
    filter.insert("tutorEmail".into(), Value::String(email));
    let materials = state.documents.find(Collection::Materials, filter).await?;
    Ok(Json(materials))
}

#[instrument(skip(state, claim), fields(caller = %claim.email))]
pub async fn delete_material(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteSummary>, AppError> {
    if !owns_material(&state, id, &claim.email).await? {
        return Ok(Json(DeleteSummary { deleted_count: 0 }));
    }
    let result = state
        .documents
        .delete_by_id(Collection::Materials, id)
        .await?;
    info!(deleted = result.deleted_count, "material deleted");
    Ok(Json(result))
}

#[instrument(skip(state, claim, patch), fields(caller = %claim.email))]
pub async fn update_material(
    State(state): State<AppState>,
    AuthUser(claim): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut patch): Json<Document>,
) -> Result<Json<UpdateSummary>, AppError> {
    if !owns_material(&state, id, &claim.email).await? {
        return Ok(Json(UpdateSummary::default()));
    }
    // The owner of a material is fixed at upload time.
    patch.remove("tutorEmail");
    patch.remove("createdAt");
    patch.insert("updatedAt".into(), timestamp()?);
    let result = state
        .documents
        .update_by_id(Collection::Materials, id, patch)
        .await?;
    info!(matched = result.matched_count, "material updated");
    Ok(Json(result))
}
