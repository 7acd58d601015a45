//! Route definitions for works.

use axum::routing::get;
use axum::Router;

use crate::handlers::works;
use crate::state::AppState;

/// Routes mounted at `/works`.
///
/// ```text
/// GET    /                        -> list
/// POST   /                        -> create
/// GET    /{id}                    -> get_by_id
/// PUT    /{id}                    -> update
/// DELETE /{id}                    -> delete
/// GET    /{id}/characters         -> list_characters
/// POST   /{id}/characters         -> add_character
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(works::list).post(works::create))
        .route(
            "/{id}",
            get(works::get_by_id).put(works::update).delete(works::delete),
        )
        .route(
            "/{id}/characters",
            get(works::list_characters).post(works::add_character),
        )
}
