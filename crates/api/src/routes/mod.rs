pub mod calligraphy;
pub mod character;
pub mod character_set;
pub mod health;
pub mod work;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ocr                                             ingest (auth)
///
/// /calligraphy/analyze                             annotate uploaded crop (POST)
/// /calligraphy/annotations                         list, create
/// /calligraphy/annotations/{id}                    get, update, delete (owner)
///
/// /works                                           list, create (multipart)
/// /works/{id}                                      get, update, delete (author)
/// /works/{id}/characters                           list, add (author)
///
/// /characters/{id}                                 get, update, delete (author)
/// /characters/{id}/annotation                      get, replace, clear (author)
/// /characters/{id}/analyze                         vision keypoints (POST, author)
///
/// /character-sets                                  list, create (auth)
/// /character-sets/{id}                             get, update, delete (owner)
/// /character-sets/{id}/characters                  list, add member
/// /character-sets/{id}/characters/{character_id}   remove member
/// /character-sets/{id}/characters/move             move member (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // OCR ingestion.
        .route("/ocr", post(handlers::ocr::ingest))
        // Keypoint analysis and annotation records.
        .nest("/calligraphy", calligraphy::router())
        // Works and the characters cut from them.
        .nest("/works", work::router())
        .nest("/characters", character::router())
        // Per-user character collections.
        .nest("/character-sets", character_set::router())
}
