//! Character entity model and DTOs.

use inkstone_core::extraction::{ExtractedCharacter, PixelBox};
use inkstone_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Source label for characters produced by OCR box extraction.
pub const SOURCE_OCR: &str = "ocr";

/// Source label for characters added by hand.
pub const SOURCE_MANUAL: &str = "manual";

/// A row from the `characters` table.
///
/// `keypoints` is a JSON array of keypoints relative to the character crop;
/// `annotation` holds the remaining annotation fields as a JSON object.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Character {
    pub id: DbId,
    pub work_id: DbId,
    pub style: String,
    pub strokes: Option<i32>,
    pub stroke_order: Option<String>,
    pub recognition: String,
    pub source: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub sort_order: i32,
    pub keypoints: serde_json::Value,
    pub annotation: serde_json::Value,
    pub collected_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Character {
    pub fn pixel_box(&self) -> PixelBox {
        PixelBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// A character joined with the parts of its work needed for ownership
/// checks and cropping.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CharacterWithWork {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub character: Character,
    pub work_author_id: DbId,
    pub work_author_username: String,
    pub work_image_path: String,
    pub work_width: i32,
    pub work_height: i32,
}

/// DTO for inserting a character. The owning work id is supplied by the
/// repository call.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacter {
    pub style: String,
    pub strokes: Option<i32>,
    pub stroke_order: Option<String>,
    pub recognition: String,
    /// Defaults to `"ocr"` if omitted.
    pub source: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub sort_order: i32,
    /// Defaults to an empty list if omitted.
    pub keypoints: Option<serde_json::Value>,
}

impl CreateCharacter {
    /// Build an insert DTO from an extracted box.
    pub fn from_extracted(extracted: &ExtractedCharacter, source: &str) -> Self {
        Self {
            style: extracted.style.clone(),
            strokes: extracted.strokes,
            stroke_order: extracted.stroke_order.clone(),
            recognition: extracted.recognition.clone(),
            source: Some(source.to_string()),
            x: extracted.pixel_box.x,
            y: extracted.pixel_box.y,
            width: extracted.pixel_box.width,
            height: extracted.pixel_box.height,
            sort_order: extracted.sort_order,
            keypoints: None,
        }
    }

    pub fn pixel_box(&self) -> PixelBox {
        PixelBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

/// DTO for updating a character. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCharacter {
    pub style: Option<String>,
    pub strokes: Option<i32>,
    pub stroke_order: Option<String>,
    pub recognition: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub sort_order: Option<i32>,
    pub keypoints: Option<serde_json::Value>,
}

impl UpdateCharacter {
    /// The box this update would leave `current` with.
    pub fn resulting_box(&self, current: &Character) -> PixelBox {
        PixelBox {
            x: self.x.unwrap_or(current.x),
            y: self.y.unwrap_or(current.y),
            width: self.width.unwrap_or(current.width),
            height: self.height.unwrap_or(current.height),
        }
    }

    pub fn touches_box(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }
}

/// An annotated character as seen by annotation listings.
#[derive(Debug, Clone, FromRow)]
pub struct CharacterAnnotationRow {
    pub id: DbId,
    pub recognition: String,
    pub keypoints: serde_json::Value,
    pub annotation: serde_json::Value,
    pub updated_at: Timestamp,
    pub author_id: DbId,
    pub username: String,
}
