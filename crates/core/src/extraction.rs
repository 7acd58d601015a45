//! Mapping OCR or manually drawn boxes onto a work's stored image.
//!
//! Boxes arrive as corner coordinates `[x1, y1, x2, y2]`. They may be
//! expressed against the originally uploaded image, so a [`ScaleFactor`]
//! from the storage normalizer is applied before the box is converted into
//! the `(x, y, width, height)` form persisted on a character.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Scale factor
// ---------------------------------------------------------------------------

/// Per-axis factor mapping original-image coordinates to stored-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor { x: 1.0, y: 1.0 };

    /// Factor taking `original` dimensions onto `stored` dimensions.
    pub fn between(original: (u32, u32), stored: (u32, u32)) -> Self {
        let axis = |from: u32, to: u32| {
            if from == 0 {
                1.0
            } else {
                to as f64 / from as f64
            }
        };
        Self {
            x: axis(original.0, stored.0),
            y: axis(original.1, stored.1),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }

    fn is_usable(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x > 0.0 && self.y > 0.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ---------------------------------------------------------------------------
// Pixel boxes
// ---------------------------------------------------------------------------

/// A character's bounding box in stored-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelBox {
    /// Build a box from corner coordinates, scaling and clamping to `bounds`.
    ///
    /// Returns `None` when the box is empty after clamping.
    pub fn from_corners(corners: [f64; 4], scale: ScaleFactor, bounds: (u32, u32)) -> Option<Self> {
        if corners.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let (max_x, max_y) = (bounds.0 as f64, bounds.1 as f64);
        let x1 = (corners[0] * scale.x).round().clamp(0.0, max_x);
        let y1 = (corners[1] * scale.y).round().clamp(0.0, max_y);
        let x2 = (corners[2] * scale.x).round().clamp(0.0, max_x);
        let y2 = (corners[3] * scale.y).round().clamp(0.0, max_y);

        let width = x2 - x1;
        let height = y2 - y1;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            x: x1 as i32,
            y: y1 as i32,
            width: width as i32,
            height: height as i32,
        })
    }

    /// Whether the box lies entirely inside a `width x height` image.
    pub fn fits_within(&self, width: i32, height: i32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width > 0
            && self.height > 0
            && i64::from(self.x) + i64::from(self.width) <= i64::from(width)
            && i64::from(self.y) + i64::from(self.height) <= i64::from(height)
    }
}

/// Validate a manually supplied box against the owning work's stored dimensions.
pub fn validate_box_within(b: &PixelBox, work_width: i32, work_height: i32) -> Result<(), CoreError> {
    if b.width <= 0 || b.height <= 0 {
        return Err(CoreError::Validation(format!(
            "box width and height must be positive, got {}x{}",
            b.width, b.height
        )));
    }
    if !b.fits_within(work_width, work_height) {
        return Err(CoreError::Validation(format!(
            "box ({}, {}, {}, {}) lies outside the {work_width}x{work_height} work image",
            b.x, b.y, b.width, b.height
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// One box as submitted with a new work, either from OCR or drawn by hand.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BoxEntry {
    /// Recognized character text.
    #[serde(default, alias = "recognition")]
    pub text: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    /// Corner coordinates; only the first four values are used.
    #[serde(default)]
    pub position: Option<Vec<f64>>,
    #[serde(default)]
    pub line_index: Option<i32>,
    #[serde(default)]
    pub word_index: Option<i32>,
    #[serde(default)]
    pub strokes: Option<i32>,
    #[serde(default)]
    pub stroke_order: Option<String>,
}

/// A box that passed extraction, ready to become a character row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCharacter {
    pub recognition: String,
    pub style: String,
    pub pixel_box: PixelBox,
    pub sort_order: i32,
    pub strokes: Option<i32>,
    pub stroke_order: Option<String>,
}

/// An input entry that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub index: usize,
    pub reason: String,
}

/// Outcome of extracting a batch of box entries.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub characters: Vec<ExtractedCharacter>,
    pub skipped: Vec<SkippedEntry>,
}

/// Convert box entries into characters anchored to a `bounds`-sized stored image.
///
/// Invalid entries are skipped rather than failing the batch. Surviving
/// characters are numbered in reading order: by OCR line, then word, then
/// submission order.
pub fn extract_characters(
    entries: &[BoxEntry],
    scale: ScaleFactor,
    bounds: (u32, u32),
    default_style: &str,
) -> Extraction {
    let scale = if scale.is_usable() {
        scale
    } else {
        ScaleFactor::IDENTITY
    };

    let mut accepted: Vec<(usize, &BoxEntry, ExtractedCharacter)> = Vec::new();
    let mut skipped = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        match extract_one(entry, scale, bounds, default_style) {
            Ok(character) => accepted.push((index, entry, character)),
            Err(reason) => skipped.push(SkippedEntry { index, reason }),
        }
    }

    accepted.sort_by_key(|(index, entry, _)| {
        (
            entry.line_index.unwrap_or(i32::MAX),
            entry.word_index.unwrap_or(i32::MAX),
            *index,
        )
    });

    let characters = accepted
        .into_iter()
        .enumerate()
        .map(|(order, (_, _, mut character))| {
            character.sort_order = order as i32;
            character
        })
        .collect();

    Extraction {
        characters,
        skipped,
    }
}

fn extract_one(
    entry: &BoxEntry,
    scale: ScaleFactor,
    bounds: (u32, u32),
    default_style: &str,
) -> Result<ExtractedCharacter, String> {
    let text = entry
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing recognized text")?;

    let style = entry
        .style
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_style);
    if style.is_empty() {
        return Err("missing style label".into());
    }

    let position = entry.position.as_deref().ok_or("missing position")?;
    if position.len() < 4 {
        return Err(format!("position needs 4 values, got {}", position.len()));
    }
    let corners = [position[0], position[1], position[2], position[3]];

    let pixel_box = PixelBox::from_corners(corners, scale, bounds)
        .ok_or("box has non-positive width or height")?;

    Ok(ExtractedCharacter {
        recognition: text.to_string(),
        style: style.to_string(),
        pixel_box,
        sort_order: 0,
        strokes: entry.strokes,
        stroke_order: entry.stroke_order.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
