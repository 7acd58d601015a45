//! Keypoint annotation documents and their ownership rules.
//!
//! An [`Annotation`] is owned either by a character (keypoints embedded on
//! the character row) or stands alone under a generated UUID (ad-hoc study
//! sessions not tied to any work). Both forms share one document shape,
//! one set of validation rules and one merge rule, defined here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::keypoints::{keypoints_from_json, Keypoint};
use crate::pagination::{PageRequest, Paged};
use crate::types::{DbId, Timestamp};

/// Prefix of the textual form of character-owned annotation ids.
const CHARACTER_ID_PREFIX: &str = "character-";

/// Document fields that only the store may set.
const PROTECTED_FIELDS: &[&str] = &["id", "user_id", "username", "timestamp"];

/// Longest label fragment used in a file name.
const MAX_LABEL_CHARS: usize = 32;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies an annotation and, through its variant, its backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AnnotationId {
    /// A free-standing record.
    Standalone(Uuid),
    /// Keypoints embedded on the character with this id.
    Character(DbId),
}

impl AnnotationId {
    /// A fresh, time-ordered standalone id.
    pub fn new_standalone() -> Self {
        Self::Standalone(Uuid::now_v7())
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone(id) => write!(f, "{id}"),
            Self::Character(id) => write!(f, "{CHARACTER_ID_PREFIX}{id}"),
        }
    }
}

impl FromStr for AnnotationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(CHARACTER_ID_PREFIX) {
            return rest
                .parse::<DbId>()
                .map(Self::Character)
                .map_err(|_| CoreError::Validation(format!("Invalid annotation id '{s}'")));
        }
        Uuid::parse_str(s)
            .map(Self::Standalone)
            .map_err(|_| CoreError::Validation(format!("Invalid annotation id '{s}'")))
    }
}

impl From<AnnotationId> for String {
    fn from(id: AnnotationId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AnnotationId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// The author an annotation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationOwner {
    pub user_id: DbId,
    pub username: String,
}

/// A keypoint annotation document.
///
/// Fields beyond the fixed ones (e.g. `overall_tips`, `complexity`,
/// `metadata`) are preserved verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub character: String,
    pub keypoints: Vec<Keypoint>,
    pub user_id: DbId,
    pub username: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    /// Build a new document from a client payload.
    ///
    /// The payload must be an object with a non-empty `character` string and
    /// an array-typed `keypoints` field. Owner attribution and the timestamp
    /// are always stamped here; client-supplied values for them are ignored.
    pub fn create(
        id: AnnotationId,
        owner: &AnnotationOwner,
        payload: Value,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        let mut fields = into_object(payload)?;
        let character = required_label(fields.get("character"))?;
        let keypoints = keypoints_from_json(
            fields
                .get("keypoints")
                .ok_or_else(|| CoreError::Validation("keypoints must be an array".into()))?,
        )?;

        fields.remove("character");
        fields.remove("keypoints");
        for key in PROTECTED_FIELDS {
            fields.remove(*key);
        }

        Ok(Self {
            id,
            character,
            keypoints,
            user_id: owner.user_id,
            username: owner.username.clone(),
            timestamp: now,
            extra: fields,
        })
    }

    /// Merge a client patch over this document.
    ///
    /// Supplied fields replace existing ones; `id`, `user_id` and `username`
    /// never change and the timestamp is refreshed.
    pub fn merged(&self, patch: Value, now: Timestamp) -> Result<Self, CoreError> {
        let patch = into_object(patch)?;
        if patch.is_empty() {
            return Err(CoreError::Validation("update payload is empty".into()));
        }

        let character = match patch.get("character") {
            Some(value) => required_label(Some(value))?,
            None => self.character.clone(),
        };
        let keypoints = match patch.get("keypoints") {
            Some(value) => keypoints_from_json(value)?,
            None => self.keypoints.clone(),
        };

        let mut extra = self.extra.clone();
        for (key, value) in patch {
            if key == "character" || key == "keypoints" || PROTECTED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            extra.insert(key, value);
        }

        Ok(Self {
            id: self.id,
            character,
            keypoints,
            user_id: self.user_id,
            username: self.username.clone(),
            timestamp: now,
            extra,
        })
    }

    /// Fail with `Forbidden` unless `caller` authored this annotation.
    pub fn ensure_owned_by(&self, caller: DbId) -> Result<(), CoreError> {
        ensure_owner(self.user_id, caller, "annotation")
    }

    pub fn summary(&self) -> AnnotationSummary {
        AnnotationSummary {
            id: self.id,
            character: self.character.clone(),
            user_id: self.user_id,
            username: self.username.clone(),
            timestamp: self.timestamp,
            keypoints_count: self.keypoints.len(),
        }
    }
}

/// Fail with `Forbidden` unless `caller` is `owner_id`.
pub fn ensure_owner(owner_id: DbId, caller: DbId, what: &str) -> Result<(), CoreError> {
    if owner_id != caller {
        return Err(CoreError::Forbidden(format!(
            "Only the owner may access this {what}"
        )));
    }
    Ok(())
}

fn into_object(payload: Value) -> Result<Map<String, Value>, CoreError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(CoreError::Validation("annotation payload must be a JSON object".into())),
    }
}

fn required_label(value: Option<&Value>) -> Result<String, CoreError> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation("character must be a non-empty string".into()))
}

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// File name for a standalone annotation:
/// `<label>_annotation_<timestamp>_<id>.json`.
pub fn annotation_file_name(label: &str, timestamp: Timestamp, id: Uuid) -> String {
    format!(
        "{}_annotation_{}_{}.json",
        sanitize_label(label),
        timestamp.format("%Y%m%d_%H%M%S"),
        id.simple()
    )
}

/// The id suffix used to locate an annotation file without its label.
pub fn annotation_file_suffix(id: Uuid) -> String {
    format!("_{}.json", id.simple())
}

/// Make a character label safe for use in a file name.
///
/// CJK characters are kept; path separators, reserved punctuation and
/// control characters become `_`.
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .take(MAX_LABEL_CHARS)
        .map(|c| {
            if c.is_control() || c.is_whitespace() || "/\\:*?\"<>|.".contains(c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One row of an annotation listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationSummary {
    pub id: AnnotationId,
    pub character: String,
    pub user_id: DbId,
    pub username: String,
    pub timestamp: Timestamp,
    pub keypoints_count: usize,
}

/// Sortable listing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSortField {
    #[default]
    Timestamp,
    Character,
    Username,
    KeypointsCount,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters and paging for an annotation listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationListQuery {
    pub character: Option<String>,
    pub user_id: Option<DbId>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(default)]
    pub sort_by: AnnotationSortField,
    #[serde(default)]
    pub order: SortOrder,
}

/// Default page size for annotation listings.
pub const DEFAULT_ANNOTATIONS_PER_PAGE: i64 = 10;

/// Largest accepted page size for annotation listings.
pub const MAX_ANNOTATIONS_PER_PAGE: i64 = 100;

/// Filter, sort and paginate annotation summaries.
pub fn list_summaries(
    mut items: Vec<AnnotationSummary>,
    query: &AnnotationListQuery,
) -> Paged<AnnotationSummary> {
    if let Some(character) = query.character.as_deref() {
        items.retain(|a| a.character == character);
    }
    if let Some(user_id) = query.user_id {
        items.retain(|a| a.user_id == user_id);
    }

    items.sort_by(|a, b| {
        let ordering = match query.sort_by {
            AnnotationSortField::Timestamp => a.timestamp.cmp(&b.timestamp),
            AnnotationSortField::Character => a.character.cmp(&b.character),
            AnnotationSortField::Username => a.username.cmp(&b.username),
            AnnotationSortField::KeypointsCount => a.keypoints_count.cmp(&b.keypoints_count),
        };
        match query.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let request = PageRequest::normalize(
        query.page,
        query.per_page,
        DEFAULT_ANNOTATIONS_PER_PAGE,
        MAX_ANNOTATIONS_PER_PAGE,
    );
    request.slice(items)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn owner() -> AnnotationOwner {
        AnnotationOwner {
            user_id: 7,
            username: "wang".into(),
        }
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn sample() -> Annotation {
        Annotation::create(
            AnnotationId::new_standalone(),
            &owner(),
            json!({
                "character": "永",
                "keypoints": [{"id": 1, "x": 0.5, "y": 0.5, "description": "点", "tips": "轻"}],
                "overall_tips": "稳"
            }),
            t0(),
        )
        .unwrap()
    }

    // -- AnnotationId ------------------------------------------------------

    #[test]
    fn character_id_round_trips_through_text() {
        let id = AnnotationId::Character(42);
        assert_eq!(id.to_string(), "character-42");
        assert_eq!("character-42".parse::<AnnotationId>().unwrap(), id);
    }

    #[test]
    fn standalone_id_parses_uuid() {
        let id = AnnotationId::new_standalone();
        assert_eq!(id.to_string().parse::<AnnotationId>().unwrap(), id);
    }

    #[test]
    fn garbage_id_rejected() {
        assert_matches!("永_annotation_20240101".parse::<AnnotationId>(), Err(CoreError::Validation(_)));
        assert_matches!("character-x".parse::<AnnotationId>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn standalone_ids_are_unique() {
        assert_ne!(AnnotationId::new_standalone(), AnnotationId::new_standalone());
    }

    // -- create ------------------------------------------------------------

    #[test]
    fn create_stamps_owner_and_keeps_extra_fields() {
        let a = sample();
        assert_eq!(a.user_id, 7);
        assert_eq!(a.username, "wang");
        assert_eq!(a.timestamp, t0());
        assert_eq!(a.extra.get("overall_tips"), Some(&json!("稳")));
    }

    #[test]
    fn create_ignores_client_owner_fields() {
        let a = Annotation::create(
            AnnotationId::new_standalone(),
            &owner(),
            json!({"character": "永", "keypoints": [], "user_id": 99, "username": "mallory"}),
            t0(),
        )
        .unwrap();
        assert_eq!(a.user_id, 7);
        assert!(!a.extra.contains_key("user_id"));
    }

    #[test]
    fn create_requires_character() {
        let err = Annotation::create(
            AnnotationId::new_standalone(),
            &owner(),
            json!({"character": "  ", "keypoints": []}),
            t0(),
        );
        assert_matches!(err, Err(CoreError::Validation(msg)) if msg.contains("character"));
    }

    #[test]
    fn create_requires_array_keypoints() {
        let err = Annotation::create(
            AnnotationId::new_standalone(),
            &owner(),
            json!({"character": "永", "keypoints": "none"}),
            t0(),
        );
        assert_matches!(err, Err(CoreError::Validation(msg)) if msg.contains("array"));

        let err = Annotation::create(AnnotationId::new_standalone(), &owner(), json!({"character": "永"}), t0());
        assert_matches!(err, Err(CoreError::Validation(_)));
    }

    // -- merged ------------------------------------------------------------

    #[test]
    fn merge_overlays_fields_and_refreshes_timestamp() {
        let a = sample();
        let later = t0() + Duration::minutes(5);
        let b = a
            .merged(json!({"overall_tips": "更稳", "complexity": "简单"}), later)
            .unwrap();
        assert_eq!(b.extra.get("overall_tips"), Some(&json!("更稳")));
        assert_eq!(b.extra.get("complexity"), Some(&json!("简单")));
        assert_eq!(b.keypoints, a.keypoints);
        assert_eq!(b.timestamp, later);
        assert_eq!(b.id, a.id);
    }

    #[test]
    fn merge_never_changes_owner() {
        let a = sample();
        let b = a
            .merged(json!({"user_id": 1, "username": "eve", "id": "character-1"}), t0())
            .unwrap();
        assert_eq!(b.user_id, 7);
        assert_eq!(b.username, "wang");
        assert_eq!(b.id, a.id);
    }

    #[test]
    fn merge_validates_supplied_fields() {
        let a = sample();
        assert_matches!(a.merged(json!({"character": ""}), t0()), Err(CoreError::Validation(_)));
        assert_matches!(a.merged(json!({"keypoints": {}}), t0()), Err(CoreError::Validation(_)));
        assert_matches!(a.merged(json!({}), t0()), Err(CoreError::Validation(_)));
    }

    #[test]
    fn ownership_enforced() {
        let a = sample();
        assert!(a.ensure_owned_by(7).is_ok());
        assert_matches!(a.ensure_owned_by(8), Err(CoreError::Forbidden(_)));
    }

    // -- serialization -----------------------------------------------------

    #[test]
    fn document_serializes_flat() {
        let a = sample();
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["id"], json!(a.id.to_string()));
        assert_eq!(value["overall_tips"], json!("稳"));
        let back: Annotation = serde_json::from_value(value).unwrap();
        assert_eq!(back, a);
    }

    // -- file naming -------------------------------------------------------

    #[test]
    fn file_name_keeps_label_and_id() {
        let id = Uuid::now_v7();
        let name = annotation_file_name("永", t0(), id);
        assert!(name.starts_with("永_annotation_20240301_080000_"));
        assert!(name.ends_with(&annotation_file_suffix(id)));
    }

    #[test]
    fn label_sanitized_for_paths() {
        assert_eq!(sanitize_label("../etc"), "___etc");
        assert_eq!(sanitize_label(""), "unknown");
        assert_eq!(sanitize_label("永 和"), "永_和");
    }

    // -- list_summaries ----------------------------------------------------

    fn summary(character: &str, user_id: DbId, minutes: i64, count: usize) -> AnnotationSummary {
        AnnotationSummary {
            id: AnnotationId::new_standalone(),
            character: character.into(),
            user_id,
            username: format!("u{user_id}"),
            timestamp: t0() + Duration::minutes(minutes),
            keypoints_count: count,
        }
    }

    #[test]
    fn default_listing_is_newest_first() {
        let items = vec![summary("一", 1, 0, 1), summary("二", 1, 2, 1), summary("三", 1, 1, 1)];
        let page = list_summaries(items, &AnnotationListQuery::default());
        let order: Vec<&str> = page.items.iter().map(|s| s.character.as_str()).collect();
        assert_eq!(order, vec!["二", "三", "一"]);
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.per_page, DEFAULT_ANNOTATIONS_PER_PAGE);
    }

    #[test]
    fn listing_filters_and_sorts_by_count() {
        let items = vec![summary("永", 1, 0, 3), summary("永", 2, 0, 1), summary("和", 1, 0, 2)];
        let query = AnnotationListQuery {
            user_id: Some(1),
            sort_by: AnnotationSortField::KeypointsCount,
            order: SortOrder::Asc,
            ..Default::default()
        };
        let page = list_summaries(items, &query);
        let counts: Vec<usize> = page.items.iter().map(|s| s.keypoints_count).collect();
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn listing_paginates() {
        let items: Vec<_> = (0..25).map(|i| summary("字", 1, i, 1)).collect();
        let query = AnnotationListQuery {
            page: Some(3),
            per_page: Some(10),
            ..Default::default()
        };
        let page = list_summaries(items, &query);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.pagination.pages, 3);
        assert_eq!(page.pagination.page, 3);
    }
}
