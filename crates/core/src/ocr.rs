//! OCR request options, response flattening and artifact naming.
//!
//! The remote recognition service answers with a nested
//! `data.text_lines[].words[]` structure. [`flatten_response`] turns it into
//! a flat, index-tagged list of [`OcrBox`] values so reading order can be
//! recovered later even when the service returns boxes out of order.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::extraction::BoxEntry;
use crate::types::Timestamp;

/// The `message` value of a successful recognition response.
pub const SUCCESS_MESSAGE: &str = "success";

/// Length of the random suffix in artifact file names.
const ARTIFACT_SUFFIX_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Ingestion options forwarded to the OCR endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    #[serde(default = "default_det_mode")]
    pub det_mode: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_return_position")]
    pub return_position: bool,
}

fn default_det_mode() -> String {
    "auto".to_string()
}

fn default_version() -> String {
    "v2".to_string()
}

fn default_return_position() -> bool {
    true
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            det_mode: default_det_mode(),
            version: default_version(),
            return_position: default_return_position(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

/// Decode a base64 image payload, accepting an optional `data:` URL prefix.
pub fn decode_image_payload(input: &str) -> Result<Vec<u8>, CoreError> {
    let trimmed = input.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| CoreError::InvalidEncoding("data URL has no ',' separator".into()))?,
        None => trimmed,
    };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(CoreError::InvalidEncoding("image payload is empty".into()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CoreError::InvalidEncoding(e.to_string()))
}

// ---------------------------------------------------------------------------
// Response flattening
// ---------------------------------------------------------------------------

/// One recognized word with its bounding rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBox {
    pub text: String,
    /// `[x1, y1, x2, y2]` in pixels of the image sent to the service.
    pub position: [f64; 4],
    pub confidence: Option<f64>,
    pub det_confidence: Option<f64>,
    pub line_index: usize,
    pub word_index: usize,
}

impl OcrBox {
    /// Convert into an extraction entry carrying the given style label.
    pub fn to_box_entry(&self, style: Option<&str>) -> BoxEntry {
        BoxEntry {
            text: Some(self.text.clone()),
            style: style.map(str::to_string),
            position: Some(self.position.to_vec()),
            line_index: i32::try_from(self.line_index).ok(),
            word_index: i32::try_from(self.word_index).ok(),
            strokes: None,
            stroke_order: None,
        }
    }
}

/// Whether the response reports success at the protocol level.
pub fn is_success(raw: &Value) -> bool {
    raw.get("message").and_then(Value::as_str) == Some(SUCCESS_MESSAGE)
}

/// Best available diagnostic for a logical (non-HTTP) recognition failure.
pub fn failure_diagnostic(raw: &Value) -> String {
    let message = raw
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("<no message>");
    let detail = ["msg", "error", "detail", "code"]
        .iter()
        .find_map(|key| raw.get(*key))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    match detail {
        Some(detail) => format!("recognition failed: {message} ({detail})"),
        None => format!("recognition failed: {message}"),
    }
}

/// Flatten a successful OCR response into ordered boxes.
///
/// Words without text or a usable position are dropped. A response without
/// the `data.text_lines` array is malformed.
pub fn flatten_response(raw: &Value) -> Result<Vec<OcrBox>, CoreError> {
    if !is_success(raw) {
        return Err(CoreError::OcrService(failure_diagnostic(raw)));
    }

    let lines = raw
        .pointer("/data/text_lines")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            CoreError::OcrService("malformed response: missing data.text_lines array".into())
        })?;

    let mut boxes = Vec::new();
    for (line_index, line) in lines.iter().enumerate() {
        let Some(words) = line.get("words").and_then(Value::as_array) else {
            continue;
        };
        for (word_index, word) in words.iter().enumerate() {
            let Some(text) = word.get("text").and_then(Value::as_str) else {
                continue;
            };
            let Some(position) = word.get("position").and_then(bounding_rect) else {
                continue;
            };
            boxes.push(OcrBox {
                text: text.to_string(),
                position,
                confidence: word.get("confidence").and_then(Value::as_f64),
                det_confidence: word.get("det_confidence").and_then(Value::as_f64),
                line_index,
                word_index,
            });
        }
    }
    Ok(boxes)
}

/// Reduce a position value to `[x1, y1, x2, y2]`.
///
/// Accepts either a scalar list (first four values are kept) or a list of
/// `[x, y]` points (the enclosing rectangle is kept).
fn bounding_rect(position: &Value) -> Option<[f64; 4]> {
    let items = position.as_array()?;
    match items.first()? {
        Value::Number(_) => {
            let scalars: Vec<f64> = items.iter().take(4).map(Value::as_f64).collect::<Option<_>>()?;
            (scalars.len() == 4).then(|| [scalars[0], scalars[1], scalars[2], scalars[3]])
        }
        Value::Array(_) => {
            let mut rect = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
            for point in items {
                let pair = point.as_array()?;
                let x = pair.first()?.as_f64()?;
                let y = pair.get(1)?.as_f64()?;
                rect[0] = rect[0].min(x);
                rect[1] = rect[1].min(y);
                rect[2] = rect[2].max(x);
                rect[3] = rect[3].max(y);
            }
            Some(rect)
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Artifact naming
// ---------------------------------------------------------------------------

/// File name for a raw OCR response: `ocr_<timestamp>_<random8>.json`.
pub fn artifact_file_name(now: Timestamp) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ARTIFACT_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("ocr_{}_{suffix}.json", now.format("%Y%m%d_%H%M%S"))
}

static ARTIFACT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ocr_\d{8}_\d{6}_[0-9a-z]{8}\.json$").expect("valid regex"));

/// Whether a file name follows the artifact naming pattern.
pub fn is_artifact_file_name(name: &str) -> bool {
    ARTIFACT_NAME_RE.is_match(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
