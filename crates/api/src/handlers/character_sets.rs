//! Handlers for the `/character-sets` resource.
//!
//! Every route acts on the caller's own sets; sets of other users are
//! reported as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use inkstone_core::pagination::Paged;
use inkstone_core::types::DbId;
use inkstone_db::models::character_set::{
    AddMember, CharacterInSet, CharacterSet, CharacterSetWithCount, CreateCharacterSet,
    MoveMember, SetMember, UpdateCharacterSet,
};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PageParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/character-sets
///
/// Most recently changed first, each with its member count.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PageParams>,
) -> AppResult<Json<DataResponse<Paged<CharacterSetWithCount>>>> {
    let page = state
        .curator
        .list_sets(user.user_id, params.page, params.per_page)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// POST /api/v1/character-sets
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateCharacterSet>,
) -> AppResult<(StatusCode, Json<DataResponse<CharacterSet>>)> {
    let set = state.curator.create_set(user.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: set })))
}

/// GET /api/v1/character-sets/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<CharacterSetWithCount>>> {
    let set = state.curator.get_set(user.user_id, id).await?;
    Ok(Json(DataResponse { data: set }))
}

/// PUT /api/v1/character-sets/{id}
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCharacterSet>,
) -> AppResult<Json<DataResponse<CharacterSet>>> {
    let set = state.curator.update_set(user.user_id, id, &input).await?;
    Ok(Json(DataResponse { data: set }))
}

/// DELETE /api/v1/character-sets/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    state.curator.delete_set(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/character-sets/{id}/characters
///
/// Most recently added first.
pub async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Query(params): Query<PageParams>,
) -> AppResult<Json<DataResponse<Paged<SetMember>>>> {
    let page = state
        .curator
        .list_members(user.user_id, id, params.page, params.per_page)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// POST /api/v1/character-sets/{id}/characters
pub async fn add_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<AddMember>,
) -> AppResult<(StatusCode, Json<DataResponse<CharacterInSet>>)> {
    let membership = state
        .curator
        .add_member(user.user_id, id, input.character_id)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: membership })))
}

/// DELETE /api/v1/character-sets/{id}/characters/{character_id}
pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, character_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    state
        .curator
        .remove_member(user.user_id, id, character_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/character-sets/{id}/characters/move
///
/// Moves a character from set `{id}` to `target_set_id` in one step.
pub async fn move_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(input): Json<MoveMember>,
) -> AppResult<Json<DataResponse<CharacterInSet>>> {
    let membership = state
        .curator
        .move_member(user.user_id, id, input.target_set_id, input.character_id)
        .await?;
    Ok(Json(DataResponse { data: membership }))
}
