pub mod calligraphy;
pub mod character_sets;
pub mod characters;
pub mod ocr;
pub mod works;

use axum::extract::multipart::Field;
use inkstone_core::annotation::AnnotationOwner;
use inkstone_core::error::CoreError;
use inkstone_db::repositories::UserRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Resolve the display name of an authenticated user for attribution.
pub(crate) async fn resolve_owner(state: &AppState, user: &AuthUser) -> AppResult<AnnotationOwner> {
    let account = UserRepo::find_by_id(&state.pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Unknown user".into())))?;
    Ok(AnnotationOwner {
        user_id: account.id,
        username: account.username,
    })
}

/// Read a multipart file field as `(file_name, bytes)`.
pub(crate) async fn read_file(field: Field<'_>) -> AppResult<(String, Vec<u8>)> {
    let file_name = field.file_name().unwrap_or("").to_string();
    if file_name.is_empty() {
        return Err(AppError::BadRequest("No file selected".into()));
    }
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok((file_name, data.to_vec()))
}

/// Read a multipart text field.
pub(crate) async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}
