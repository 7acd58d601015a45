//! Route definitions for character sets and their membership.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::character_sets;
use crate::state::AppState;

/// Routes mounted at `/character-sets`.
///
/// ```text
/// GET    /                                   -> list
/// POST   /                                   -> create
/// GET    /{id}                               -> get_by_id
/// PUT    /{id}                               -> update
/// DELETE /{id}                               -> delete
/// GET    /{id}/characters                    -> list_members
/// POST   /{id}/characters                    -> add_member
/// POST   /{id}/characters/move               -> move_member
/// DELETE /{id}/characters/{character_id}     -> remove_member
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(character_sets::list).post(character_sets::create))
        .route(
            "/{id}",
            get(character_sets::get_by_id)
                .put(character_sets::update)
                .delete(character_sets::delete),
        )
        .route(
            "/{id}/characters",
            get(character_sets::list_members).post(character_sets::add_member),
        )
        .route("/{id}/characters/move", post(character_sets::move_member))
        .route(
            "/{id}/characters/{character_id}",
            delete(character_sets::remove_member),
        )
}
