//! Work entity model and DTOs.

use inkstone_core::error::CoreError;
use inkstone_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Review states a work moves through.
pub const WORK_STATUSES: &[&str] = &["pending", "approved", "rejected"];

/// Status listings default to when none is requested.
pub const DEFAULT_LIST_STATUS: &str = "approved";

/// A row from the `works` table.
///
/// `width`/`height` are the dimensions of the image as stored, which is the
/// coordinate space of every character box on this work.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Work {
    pub id: DbId,
    pub author_id: DbId,
    pub title: String,
    pub description: String,
    pub image_path: String,
    pub style: String,
    pub dynasty: String,
    pub author_name: String,
    pub source_type: String,
    pub tags: Vec<String>,
    pub status: String,
    pub width: i32,
    pub height: i32,
    pub views: i64,
    pub ocr_artifact_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a work. Built by the upload handler after the image
/// has been normalized and written to disk.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWork {
    pub author_id: DbId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_path: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub dynasty: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub width: i32,
    pub height: i32,
    pub ocr_artifact_path: Option<String>,
}

/// DTO for updating work metadata. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWork {
    pub title: Option<String>,
    pub description: Option<String>,
    pub style: Option<String>,
    pub dynasty: Option<String>,
    pub author_name: Option<String>,
    pub source_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
}

/// Filters accepted by the work listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkListFilter {
    pub status: Option<String>,
    pub style: Option<String>,
    pub author_id: Option<DbId>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
}

/// Reject statuses outside [`WORK_STATUSES`].
pub fn validate_status(status: &str) -> Result<(), CoreError> {
    if WORK_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid status '{status}'. Must be one of: {}",
            WORK_STATUSES.join(", ")
        )))
    }
}
