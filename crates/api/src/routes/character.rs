//! Route definitions for single characters and their embedded keypoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::characters;
use crate::state::AppState;

/// Routes mounted at `/characters`.
///
/// ```text
/// GET    /{id}                    -> get_by_id
/// PUT    /{id}                    -> update
/// DELETE /{id}                    -> delete
/// GET    /{id}/annotation         -> get_annotation
/// PUT    /{id}/annotation         -> put_annotation
/// DELETE /{id}/annotation         -> delete_annotation
/// POST   /{id}/analyze            -> analyze
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(characters::get_by_id)
                .put(characters::update)
                .delete(characters::delete),
        )
        .route(
            "/{id}/annotation",
            get(characters::get_annotation)
                .put(characters::put_annotation)
                .delete(characters::delete_annotation),
        )
        .route("/{id}/analyze", post(characters::analyze))
}
