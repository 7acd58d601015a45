//! Turning boxes into persisted characters, and guarding later edits.

use inkstone_core::annotation::ensure_owner;
use inkstone_core::error::CoreError;
use inkstone_core::extraction::{extract_characters, validate_box_within, BoxEntry, ScaleFactor, SkippedEntry};
use inkstone_core::keypoints::keypoints_from_json;
use inkstone_core::types::DbId;
use inkstone_db::models::character::{
    Character, CharacterWithWork, CreateCharacter, UpdateCharacter, SOURCE_MANUAL, SOURCE_OCR,
};
use inkstone_db::models::work::{CreateWork, Work};
use inkstone_db::repositories::{CharacterRepo, WorkRepo};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::PipelineError;

/// A character drawn by hand on an existing work.
#[derive(Debug, Clone, Deserialize)]
pub struct AddCharacter {
    pub recognition: String,
    #[serde(default)]
    pub style: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub strokes: Option<i32>,
    pub stroke_order: Option<String>,
    pub keypoints: Option<serde_json::Value>,
    /// Appended after the existing characters if omitted.
    pub sort_order: Option<i32>,
}

/// A new work with the characters that survived extraction.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedWork {
    pub work: Work,
    pub characters: Vec<Character>,
    pub skipped: Vec<SkippedEntry>,
}

/// Persists characters and enforces that only a work's author edits them.
#[derive(Debug, Clone)]
pub struct CharacterExtractor {
    pool: PgPool,
}

impl CharacterExtractor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a work and its characters in one transaction.
    ///
    /// `scale` maps the coordinate space of `entries` onto the stored image
    /// described by `input.width`/`input.height`. Entries that cannot form a
    /// valid box inside that image are skipped and reported.
    pub async fn create_work(
        &self,
        input: &CreateWork,
        entries: &[BoxEntry],
        scale: ScaleFactor,
    ) -> Result<CreatedWork, PipelineError> {
        if input.width <= 0 || input.height <= 0 {
            return Err(CoreError::Validation("work dimensions must be positive".into()).into());
        }
        let bounds = (input.width as u32, input.height as u32);
        let extraction = extract_characters(entries, scale, bounds, &input.style);

        let source = if input.ocr_artifact_path.is_some() {
            SOURCE_OCR
        } else {
            SOURCE_MANUAL
        };
        let creates: Vec<CreateCharacter> = extraction
            .characters
            .iter()
            .map(|c| CreateCharacter::from_extracted(c, source))
            .collect();

        let (work, characters) =
            WorkRepo::create_with_characters(&self.pool, input, &creates).await?;

        for skip in &extraction.skipped {
            tracing::debug!(work_id = work.id, index = skip.index, reason = %skip.reason, "Box skipped");
        }
        tracing::info!(
            work_id = work.id,
            characters = characters.len(),
            skipped = extraction.skipped.len(),
            scaled = !scale.is_identity(),
            "Work created",
        );

        Ok(CreatedWork {
            work,
            characters,
            skipped: extraction.skipped,
        })
    }

    /// Add one character to a work authored by `caller`.
    pub async fn add_character(
        &self,
        caller: DbId,
        work_id: DbId,
        input: &AddCharacter,
    ) -> Result<Character, PipelineError> {
        let work = WorkRepo::find_by_id(&self.pool, work_id)
            .await?
            .ok_or(PipelineError::not_found("Work", work_id))?;
        ensure_owner(work.author_id, caller, "work")?;

        let recognition = required_text(&input.recognition, "recognition")?;
        let style = required_text(&input.style, "style")?;
        let create = CreateCharacter {
            style,
            strokes: input.strokes,
            stroke_order: input.stroke_order.clone(),
            recognition,
            source: Some(SOURCE_MANUAL.to_string()),
            x: input.x,
            y: input.y,
            width: input.width,
            height: input.height,
            sort_order: match input.sort_order {
                Some(order) => order,
                None => CharacterRepo::next_sort_order(&self.pool, work_id).await?,
            },
            keypoints: input.keypoints.as_ref().map(validated_keypoints).transpose()?,
        };
        validate_box_within(&create.pixel_box(), work.width, work.height)?;

        let character = CharacterRepo::create(&self.pool, work_id, &create).await?;
        tracing::info!(work_id, character_id = character.id, "Character added");
        Ok(character)
    }

    /// Apply a partial update to a character of a work authored by `caller`.
    pub async fn update_character(
        &self,
        caller: DbId,
        id: DbId,
        mut input: UpdateCharacter,
    ) -> Result<Character, PipelineError> {
        let existing = self.owned_character(caller, id).await?;

        if input.touches_box() {
            let next = input.resulting_box(&existing.character);
            validate_box_within(&next, existing.work_width, existing.work_height)?;
        }
        if let Some(text) = input.recognition.as_deref() {
            input.recognition = Some(required_text(text, "recognition")?);
        }
        if let Some(style) = input.style.as_deref() {
            input.style = Some(required_text(style, "style")?);
        }
        if let Some(keypoints) = input.keypoints.as_ref() {
            input.keypoints = Some(validated_keypoints(keypoints)?);
        }

        let character = CharacterRepo::update(&self.pool, id, &input)
            .await?
            .ok_or(PipelineError::not_found("Character", id))?;
        tracing::info!(character_id = id, "Character updated");
        Ok(character)
    }

    /// Delete a character of a work authored by `caller`.
    pub async fn delete_character(&self, caller: DbId, id: DbId) -> Result<(), PipelineError> {
        self.owned_character(caller, id).await?;
        if !CharacterRepo::delete(&self.pool, id).await? {
            return Err(PipelineError::not_found("Character", id));
        }
        tracing::info!(character_id = id, "Character deleted");
        Ok(())
    }

    /// Load a character and check `caller` authored its work.
    pub async fn owned_character(
        &self,
        caller: DbId,
        id: DbId,
    ) -> Result<CharacterWithWork, PipelineError> {
        let found = CharacterRepo::find_with_work(&self.pool, id)
            .await?
            .ok_or(PipelineError::not_found("Character", id))?;
        ensure_owner(found.work_author_id, caller, "character")?;
        Ok(found)
    }
}

fn required_text(value: &str, field: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn validated_keypoints(value: &serde_json::Value) -> Result<serde_json::Value, CoreError> {
    let keypoints = keypoints_from_json(value)?;
    serde_json::to_value(keypoints)
        .map_err(|e| CoreError::Internal(format!("Failed to encode keypoints: {e}")))
}
