//! Route definitions for keypoint analysis and standalone annotations.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::calligraphy;
use crate::state::AppState;

/// Routes mounted at `/calligraphy`.
///
/// ```text
/// POST   /analyze                 -> analyze
/// GET    /annotations             -> list_annotations
/// POST   /annotations             -> create_annotation
/// GET    /annotations/{id}        -> get_annotation
/// PUT    /annotations/{id}        -> update_annotation
/// DELETE /annotations/{id}        -> delete_annotation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(calligraphy::analyze))
        .route(
            "/annotations",
            get(calligraphy::list_annotations).post(calligraphy::create_annotation),
        )
        .route(
            "/annotations/{id}",
            get(calligraphy::get_annotation)
                .put(calligraphy::update_annotation)
                .delete(calligraphy::delete_annotation),
        )
}
