//! Keypoint guidance produced by the vision model.
//!
//! A keypoint is a position relative to the character crop (both axes in
//! `0.0..=1.0`) with a short description and a copying tip. The model is
//! asked for JSON but frequently wraps it in a markdown code fence, so
//! [`parse_analysis`] strips one before parsing.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Fewest keypoints an analysis may return.
pub const MIN_KEYPOINTS: usize = 1;

/// Most keypoints kept from an analysis.
pub const MAX_KEYPOINTS: usize = 5;

/// Instruction sent alongside every character crop.
pub const ANALYSIS_PROMPT: &str = r#"请分析图片中的这个书法单字，为临摹者标注关键位置。

1. 按字的繁简程度标注 1 到 5 个关键点：结构简单的字 1 到 2 个，较复杂的字 3 到 5 个。
2. 关键点应落在临摹时最容易出错的位置，例如笔画交叉处、转折处、结构重心处。
3. 坐标使用相对坐标：以图片左上角为原点，x 和 y 都在 0 到 1 之间，图片中心为 (0.5, 0.5)。
4. 每个关键点给出位置说明 description 和具体可操作的临摹要点 tips。
5. 最后给出整体临摹建议 overall_tips。

只返回如下格式的 JSON，不要输出任何其他文字：
{
    "character": "字",
    "complexity": "简单/中等/复杂",
    "keypoints": [
        {"id": 1, "x": 0.5, "y": 0.3, "description": "位置说明", "tips": "临摹要点"}
    ],
    "overall_tips": "整体临摹建议"
}"#;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single annotated point on a character crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    #[serde(default)]
    pub id: i32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tips: String,
}

/// Metadata appended to an analysis after a successful model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Size of the image actually sent to the model, as `WIDTHxHEIGHT`.
    pub image_size: String,
    pub analysis_time: Timestamp,
    pub model: String,
}

/// Structured result of a keypoint analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointAnalysis {
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub complexity: String,
    pub keypoints: Vec<Keypoint>,
    #[serde(default)]
    pub overall_tips: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AnalysisMetadata>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Remove one leading and one trailing markdown code fence, if present.
///
/// Handles both ` ```json ` and bare ` ``` ` openers.
pub fn strip_code_fence(content: &str) -> &str {
    let mut body = content.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (e.g. `json`) up to the end of the opening line.
        body = match rest.find('\n') {
            Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[newline + 1..]
            }
            _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parse the model's reply into a validated [`KeypointAnalysis`].
///
/// Keypoints without an id are numbered from 1. Analyses with more than
/// [`MAX_KEYPOINTS`] points are truncated.
pub fn parse_analysis(content: &str) -> Result<KeypointAnalysis, CoreError> {
    let body = strip_code_fence(content);
    let mut analysis: KeypointAnalysis = serde_json::from_str(body)
        .map_err(|e| CoreError::AnalysisParse(format!("model reply is not the expected JSON: {e}")))?;

    if analysis.keypoints.len() < MIN_KEYPOINTS {
        return Err(CoreError::AnalysisParse(
            "model reply contains no keypoints".to_string(),
        ));
    }
    analysis.keypoints.truncate(MAX_KEYPOINTS);
    validate_keypoint_coordinates(&analysis.keypoints).map_err(|e| match e {
        CoreError::Validation(msg) => CoreError::AnalysisParse(msg),
        other => other,
    })?;
    number_keypoints(&mut analysis.keypoints);
    Ok(analysis)
}

/// Assign sequential ids (starting at 1) to keypoints that lack one.
pub fn number_keypoints(keypoints: &mut [Keypoint]) {
    for (i, point) in keypoints.iter_mut().enumerate() {
        if point.id <= 0 {
            point.id = i as i32 + 1;
        }
    }
}

/// Check every keypoint lies inside the unit square.
pub fn validate_keypoint_coordinates(keypoints: &[Keypoint]) -> Result<(), CoreError> {
    for (i, point) in keypoints.iter().enumerate() {
        for (axis, value) in [("x", point.x), ("y", point.y)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(CoreError::Validation(format!(
                    "keypoints[{i}].{axis} must be within 0..=1, got {value}"
                )));
            }
        }
    }
    Ok(())
}

/// Parse and validate a user-supplied keypoint list (may be empty).
pub fn keypoints_from_json(value: &serde_json::Value) -> Result<Vec<Keypoint>, CoreError> {
    if !value.is_array() {
        return Err(CoreError::Validation("keypoints must be an array".to_string()));
    }
    let mut keypoints: Vec<Keypoint> = serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Validation(format!("invalid keypoints: {e}")))?;
    validate_keypoint_coordinates(&keypoints)?;
    number_keypoints(&mut keypoints);
    Ok(keypoints)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
