//! Handlers for ad-hoc calligraphy analysis and the annotation records it
//! produces.
//!
//! Annotation ids are either UUIDs (standalone records) or
//! `character-<id>` (keypoints stored on a character).

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use inkstone_core::annotation::{Annotation, AnnotationId, AnnotationListQuery, AnnotationSummary};
use inkstone_core::imaging::UploadPolicy;
use inkstone_core::keypoints::KeypointAnalysis;
use inkstone_core::pagination::Paged;
use serde_json::Value;

use super::{read_file, resolve_owner};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/calligraphy/analyze
///
/// Multipart form with a single `image` field holding one character crop.
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<KeypointAnalysis>>> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("image") {
            upload = Some(read_file(field).await?);
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("Missing required 'image' field".into()))?;
    UploadPolicy::analysis(state.config.storage.max_analysis_bytes)
        .check(&file_name, bytes.len())?;

    let analysis = state.annotator.annotate_bytes(bytes).await?;
    Ok(Json(DataResponse { data: analysis }))
}

/// GET /api/v1/calligraphy/annotations
///
/// Query: `character`, `user_id`, `page`, `per_page`, `sort_by`, `order`.
pub async fn list_annotations(
    State(state): State<AppState>,
    Query(query): Query<AnnotationListQuery>,
) -> AppResult<Json<DataResponse<Paged<AnnotationSummary>>>> {
    let page = state.annotations.list(&query).await?;
    Ok(Json(DataResponse { data: page }))
}

/// POST /api/v1/calligraphy/annotations
pub async fn create_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<Value>,
) -> AppResult<(StatusCode, Json<DataResponse<Annotation>>)> {
    let owner = resolve_owner(&state, &user).await?;
    let annotation = state.annotations.create(&owner, payload).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: annotation })))
}

/// GET /api/v1/calligraphy/annotations/{id}
pub async fn get_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Annotation>>> {
    let id: AnnotationId = id.parse()?;
    let annotation = state.annotations.get(id, user.user_id).await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// PUT /api/v1/calligraphy/annotations/{id}
///
/// Supplied fields replace stored ones; owner fields cannot be changed.
pub async fn update_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> AppResult<Json<DataResponse<Annotation>>> {
    let id: AnnotationId = id.parse()?;
    let annotation = state.annotations.update(id, user.user_id, patch).await?;
    Ok(Json(DataResponse { data: annotation }))
}

/// DELETE /api/v1/calligraphy/annotations/{id}
pub async fn delete_annotation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id: AnnotationId = id.parse()?;
    state.annotations.delete(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
