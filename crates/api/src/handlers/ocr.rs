//! Handler for `POST /ocr`.

use axum::extract::State;
use axum::Json;
use inkstone_pipeline::ingest::{IngestRequest, IngestResult};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/ocr
///
/// Recognize a base64 image. The raw response is kept as an artifact; pass
/// the returned `artifact_path` to `POST /works` to link it to the new work.
pub async fn ingest(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<IngestRequest>,
) -> AppResult<Json<DataResponse<IngestResult>>> {
    tracing::debug!(user_id = user.user_id, det_mode = %input.options.det_mode, "OCR requested");
    let result = state.ingestion.ingest(&input.image, &input.options).await?;
    Ok(Json(DataResponse { data: result }))
}
