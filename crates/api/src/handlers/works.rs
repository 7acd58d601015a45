//! Handlers for the `/works` resource and its characters.
//!
//! A work is created from a multipart upload. The image is normalized for
//! storage first, and every character box submitted with it is mapped into
//! the stored image's coordinate space before it is persisted.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use inkstone_core::annotation::ensure_owner;
use inkstone_core::error::CoreError;
use inkstone_core::extraction::{BoxEntry, ScaleFactor};
use inkstone_core::imaging::{normalize_for_storage, UploadPolicy};
use inkstone_core::pagination::{PageRequest, Paged, Pagination};
use inkstone_core::types::DbId;
use inkstone_db::models::character::Character;
use inkstone_db::models::work::{
    validate_status, CreateWork, UpdateWork, Work, WorkListFilter, DEFAULT_LIST_STATUS,
};
use inkstone_db::repositories::{CharacterRepo, WorkRepo};
use inkstone_pipeline::extract::{AddCharacter, CreatedWork};

use super::{read_file, read_text};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::query::WorkListParams;
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_WORKS_PER_PAGE: i64 = 12;
const MAX_WORKS_PER_PAGE: i64 = 100;

/// `status` value that lists works in every review state.
const ANY_STATUS: &str = "all";

// ---------------------------------------------------------------------------
// Upload form
// ---------------------------------------------------------------------------

/// Coordinate space of the `characters` boxes in an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BoxSpace {
    /// Pixels of the image as uploaded (e.g. boxes from an OCR call on it).
    #[default]
    Original,
    /// Pixels of the image as stored after normalization.
    Stored,
}

impl BoxSpace {
    fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim() {
            "" | "original" => Ok(Self::Original),
            "stored" => Ok(Self::Stored),
            other => Err(CoreError::Validation(format!(
                "box_space must be 'original' or 'stored', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct WorkUpload {
    image: Option<(String, Vec<u8>)>,
    title: String,
    description: String,
    style: String,
    dynasty: String,
    author_name: String,
    source_type: String,
    tags: Vec<String>,
    characters: Vec<BoxEntry>,
    ocr_artifact_path: Option<String>,
    box_space: BoxSpace,
}

impl WorkUpload {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut upload = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "image" => upload.image = Some(read_file(field).await?),
                "title" => upload.title = read_text(field).await?.trim().to_string(),
                "description" => upload.description = read_text(field).await?,
                "style" => upload.style = read_text(field).await?.trim().to_string(),
                "dynasty" => upload.dynasty = read_text(field).await?.trim().to_string(),
                "author_name" => upload.author_name = read_text(field).await?.trim().to_string(),
                "source_type" => upload.source_type = read_text(field).await?.trim().to_string(),
                "tags" => upload.tags = parse_tags(&read_text(field).await?),
                "characters" => {
                    let raw = read_text(field).await?;
                    if !raw.trim().is_empty() {
                        upload.characters = serde_json::from_str(&raw).map_err(|e| {
                            CoreError::Validation(format!("characters must be a JSON array: {e}"))
                        })?;
                    }
                }
                "ocr_artifact_path" => {
                    let raw = read_text(field).await?;
                    upload.ocr_artifact_path =
                        Some(raw.trim().to_string()).filter(|p| !p.is_empty());
                }
                "box_space" => upload.box_space = BoxSpace::parse(&read_text(field).await?)?,
                _ => {} // ignore unknown fields
            }
        }
        Ok(upload)
    }
}

/// Accept tags as a JSON array or a comma-separated list.
fn parse_tags(raw: &str) -> Vec<String> {
    let parsed: Vec<String> = serde_json::from_str(raw).unwrap_or_else(|_| {
        raw.split(',').map(str::to_string).collect()
    });
    parsed
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/works
///
/// Multipart fields: `image` (required), `title` (required), `description`,
/// `style`, `dynasty`, `author_name`, `source_type`, `tags`, `characters`
/// (JSON array of boxes), `ocr_artifact_path`, `box_space`.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedWork>>)> {
    let upload = WorkUpload::read(multipart).await?;

    let (file_name, bytes) = upload
        .image
        .ok_or_else(|| AppError::BadRequest("Missing required 'image' field".into()))?;
    if upload.title.is_empty() {
        return Err(CoreError::Validation("title is required".into()).into());
    }
    UploadPolicy::work(state.config.storage.max_upload_bytes).check(&file_name, bytes.len())?;

    let ocr_artifact_path = match upload.ocr_artifact_path.as_deref() {
        Some(reference) => Some(state.ingestion.artifacts().resolve_reference(reference).await?),
        None => None,
    };

    let normalized = tokio::task::spawn_blocking(move || normalize_for_storage(&bytes))
        .await
        .map_err(|e| AppError::InternalError(format!("Image task failed: {e}")))??;

    let dir = state.config.storage.upload_dir.join("works");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let image_path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), normalized.extension()));
    tokio::fs::write(&image_path, &normalized.bytes)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let scale = match upload.box_space {
        BoxSpace::Original => normalized.scale,
        BoxSpace::Stored => ScaleFactor::IDENTITY,
    };
    let input = CreateWork {
        author_id: user.user_id,
        title: upload.title,
        description: upload.description,
        image_path: image_path.to_string_lossy().into_owned(),
        style: upload.style,
        dynasty: upload.dynasty,
        author_name: upload.author_name,
        source_type: upload.source_type,
        tags: upload.tags,
        width: normalized.width as i32,
        height: normalized.height as i32,
        ocr_artifact_path,
    };

    let created = match state.extractor.create_work(&input, &upload.characters, scale).await {
        Ok(created) => created,
        Err(e) => {
            remove_image(&image_path).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        work_id = created.work.id,
        user_id = user.user_id,
        original = %format!("{}x{}", normalized.original_width, normalized.original_height),
        stored = %format!("{}x{}", normalized.width, normalized.height),
        "Work uploaded",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/works
///
/// Newest first. `status` defaults to `approved`; `all` lists every state.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<WorkListParams>,
) -> AppResult<Json<DataResponse<Paged<Work>>>> {
    let status = match params.status.as_deref().map(str::trim) {
        Some(ANY_STATUS) => None,
        Some(status) if !status.is_empty() => {
            validate_status(status)?;
            Some(status.to_string())
        }
        _ => Some(DEFAULT_LIST_STATUS.to_string()),
    };
    let filter = WorkListFilter {
        status,
        style: params.style.filter(|s| !s.trim().is_empty()),
        author_id: params.author_id,
        search: params.search,
    };
    let request = PageRequest::normalize(
        params.page,
        params.per_page,
        DEFAULT_WORKS_PER_PAGE,
        MAX_WORKS_PER_PAGE,
    );

    let (items, total) = WorkRepo::list(&state.pool, &filter, request).await?;
    Ok(Json(DataResponse {
        data: Paged {
            items,
            pagination: Pagination::new(total, request),
        },
    }))
}

/// GET /api/v1/works/{id}
///
/// Counts as a view.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Work>>> {
    let work = WorkRepo::record_view(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Work", id }))?;
    Ok(Json(DataResponse { data: work }))
}

/// PUT /api/v1/works/{id}
///
/// Author only. The review status is not editable here.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateWork>,
) -> AppResult<Json<DataResponse<Work>>> {
    let work = find_work(&state, id).await?;
    ensure_owner(work.author_id, user.user_id, "work")?;

    if input.status.is_some() {
        return Err(CoreError::Forbidden("Work status is set by review".into()).into());
    }
    if let Some(title) = input.title.as_deref() {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("title must not be empty".into()).into());
        }
        input.title = Some(title.to_string());
    }

    let updated = WorkRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Work", id }))?;
    tracing::info!(work_id = id, "Work updated");
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/works/{id}
///
/// Author only. Characters and their set memberships go with the work.
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let work = find_work(&state, id).await?;
    ensure_owner(work.author_id, user.user_id, "work")?;

    if !WorkRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "Work", id }));
    }
    remove_image(&PathBuf::from(&work.image_path)).await;
    tracing::info!(work_id = id, "Work deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/works/{id}/characters
///
/// In reading order.
pub async fn list_characters(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Character>>>> {
    find_work(&state, id).await?;
    let characters = CharacterRepo::list_by_work(&state.pool, id).await?;
    Ok(Json(DataResponse { data: characters }))
}

/// POST /api/v1/works/{id}/characters
///
/// Author only. The box is in stored-image pixels.
pub async fn add_character(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<AddCharacter>,
) -> AppResult<(StatusCode, Json<DataResponse<Character>>)> {
    let character = state.extractor.add_character(user.user_id, id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: character })))
}

async fn find_work(state: &AppState, id: DbId) -> AppResult<Work> {
    WorkRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Work", id }))
}

/// Best-effort removal of a stored work image.
async fn remove_image(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove work image");
    }
}
