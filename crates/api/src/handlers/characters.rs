//! Handlers for the `/characters` resource.
//!
//! Reads are public. Every write, and the embedded annotation, belongs to
//! the author of the character's work.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use inkstone_core::annotation::{Annotation, AnnotationId};
use inkstone_core::error::CoreError;
use inkstone_core::types::DbId;
use inkstone_db::models::character::{Character, UpdateCharacter};
use inkstone_db::repositories::CharacterRepo;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/characters/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Character>>> {
    let character = CharacterRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Character",
            id,
        }))?;
    Ok(Json(DataResponse { data: character }))
}

/// PUT /api/v1/characters/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCharacter>,
) -> AppResult<Json<DataResponse<Character>>> {
    let character = state.extractor.update_character(user.user_id, id, input).await?;
    Ok(Json(DataResponse { data: character }))
}

/// DELETE /api/v1/characters/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.extractor.delete_character(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/characters/{id}/annotation
pub async fn get_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Annotation>>> {
    let annotation = state
        .annotations
        .get(AnnotationId::Character(id), user.user_id)
        .await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// PUT /api/v1/characters/{id}/annotation
///
/// Body is merged over the stored annotation; `keypoints` replaces the list.
pub async fn put_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(patch): Json<Value>,
) -> AppResult<Json<DataResponse<Annotation>>> {
    let annotation = state
        .annotations
        .update(AnnotationId::Character(id), user.user_id, patch)
        .await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// DELETE /api/v1/characters/{id}/annotation
pub async fn delete_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state
        .annotations
        .delete(AnnotationId::Character(id), user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/characters/{id}/analyze
///
/// Crops the character from its work image, asks the vision model for
/// keypoints and stores them on the character.
pub async fn analyze(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Annotation>>> {
    let found = state.extractor.owned_character(user.user_id, id).await?;
    let analysis = state
        .annotator
        .annotate_region(FsPath::new(&found.work_image_path), found.character.pixel_box())
        .await?;

    let mut patch = serde_json::to_value(&analysis)
        .map_err(|e| AppError::InternalError(format!("Failed to encode analysis: {e}")))?;
    // The recognized text on the character stays authoritative.
    if let Value::Object(fields) = &mut patch {
        fields.remove("character");
    }

    let annotation = state
        .annotations
        .update(AnnotationId::Character(id), user.user_id, patch)
        .await?;
    tracing::info!(
        character_id = id,
        keypoints = annotation.keypoints.len(),
        "Character analyzed",
    );
    Ok(Json(DataResponse { data: annotation }))
}
