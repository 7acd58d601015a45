//! Persistence of keypoint annotations.
//!
//! Annotations live in one of two backings, chosen by the id variant:
//! standalone documents are JSON files, embedded annotations are the
//! keypoints stored on a character row. Both implement [`AnnotationStore`];
//! [`Annotations`] routes each call and applies the ownership and merge
//! rules from `inkstone_core::annotation` identically for both.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use inkstone_core::annotation::{
    annotation_file_name, annotation_file_suffix, list_summaries, Annotation, AnnotationId,
    AnnotationListQuery, AnnotationOwner, AnnotationSummary,
};
use inkstone_core::error::CoreError;
use inkstone_core::keypoints::{keypoints_from_json, Keypoint};
use inkstone_core::pagination::Paged;
use inkstone_core::types::DbId;
use inkstone_db::models::character::{CharacterAnnotationRow, CharacterWithWork};
use inkstone_db::repositories::CharacterRepo;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::PipelineError;

/// Storage backend for annotation documents.
///
/// Implementations only load and store; they perform no ownership checks.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn load(&self, id: AnnotationId) -> Result<Option<Annotation>, PipelineError>;

    /// Insert or replace the document with `annotation.id`.
    async fn save(&self, annotation: &Annotation) -> Result<(), PipelineError>;

    /// Returns `true` if a document was removed.
    async fn remove(&self, id: AnnotationId) -> Result<bool, PipelineError>;

    /// Summaries of every stored document.
    async fn summaries(&self) -> Result<Vec<AnnotationSummary>, PipelineError>;
}

// ---------------------------------------------------------------------------
// Standalone (file backed)
// ---------------------------------------------------------------------------

/// Standalone annotations, one JSON file each.
///
/// A file is named once, at creation, from its label, timestamp and id;
/// later saves rewrite the same file.
#[derive(Debug)]
pub struct FileAnnotationStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAnnotationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn find_path(&self, id: Uuid) -> Result<Option<PathBuf>, PipelineError> {
        let suffix = annotation_file_suffix(id);
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read annotation directory", e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("read annotation directory", e))?
        {
            if entry.file_name().to_string_lossy().ends_with(&suffix) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    async fn read(path: &Path) -> Result<Annotation, PipelineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| io_error("read annotation", e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::Internal(format!("Corrupt annotation file {}: {e}", path.display())).into()
        })
    }

    fn standalone_id(id: AnnotationId) -> Option<Uuid> {
        match id {
            AnnotationId::Standalone(uuid) => Some(uuid),
            AnnotationId::Character(_) => None,
        }
    }
}

#[async_trait]
impl AnnotationStore for FileAnnotationStore {
    async fn load(&self, id: AnnotationId) -> Result<Option<Annotation>, PipelineError> {
        let Some(uuid) = Self::standalone_id(id) else {
            return Ok(None);
        };
        match self.find_path(uuid).await? {
            Some(path) => Self::read(&path).await.map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, annotation: &Annotation) -> Result<(), PipelineError> {
        let uuid = Self::standalone_id(annotation.id).ok_or_else(|| {
            CoreError::Internal("character annotations are not stored as files".into())
        })?;
        let body = serde_json::to_vec_pretty(annotation)
            .map_err(|e| CoreError::Internal(format!("Failed to encode annotation: {e}")))?;

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("create annotation directory", e))?;

        let path = match self.find_path(uuid).await? {
            Some(existing) => existing,
            None => self
                .dir
                .join(annotation_file_name(&annotation.character, annotation.timestamp, uuid)),
        };

        // Write then rename so readers never observe a partial document.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| io_error("write annotation", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("write annotation", e))?;
        Ok(())
    }

    async fn remove(&self, id: AnnotationId) -> Result<bool, PipelineError> {
        let Some(uuid) = Self::standalone_id(id) else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().await;
        match self.find_path(uuid).await? {
            Some(path) => {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| io_error("delete annotation", e))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn summaries(&self) -> Result<Vec<AnnotationSummary>, PipelineError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read annotation directory", e)),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("read annotation directory", e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.ends_with(".json") || !name.contains("_annotation_") {
                continue;
            }
            match Self::read(&entry.path()).await {
                Ok(annotation) => out.push(annotation.summary()),
                Err(e) => tracing::warn!(file = %name, error = %e, "Skipping unreadable annotation"),
            }
        }
        Ok(out)
    }
}

fn io_error(action: &str, e: std::io::Error) -> PipelineError {
    CoreError::Internal(format!("Failed to {action}: {e}")).into()
}

// ---------------------------------------------------------------------------
// Embedded (character backed)
// ---------------------------------------------------------------------------

/// Annotations embedded on characters.
///
/// The owner of an embedded annotation is the author of the character's
/// work, and its label is the character's recognized text. Saving stores
/// the keypoints and any extra fields; the label itself is not changed
/// through the annotation.
#[derive(Debug, Clone)]
pub struct CharacterAnnotationStore {
    pool: PgPool,
}

impl CharacterAnnotationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn character_id(id: AnnotationId) -> Option<DbId> {
        match id {
            AnnotationId::Character(id) => Some(id),
            AnnotationId::Standalone(_) => None,
        }
    }
}

/// Build an annotation document from stored columns.
fn embedded_annotation(
    id: DbId,
    character: &str,
    keypoints: &Value,
    extra: &Value,
    owner: AnnotationOwner,
    timestamp: inkstone_core::types::Timestamp,
) -> Result<Annotation, PipelineError> {
    let keypoints: Vec<Keypoint> = keypoints_from_json(keypoints)
        .map_err(|e| CoreError::Internal(format!("Stored keypoints of character {id} are invalid: {e}")))?;
    let extra = match extra {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    Ok(Annotation {
        id: AnnotationId::Character(id),
        character: character.to_string(),
        keypoints,
        user_id: owner.user_id,
        username: owner.username,
        timestamp,
        extra,
    })
}

fn owner_of(row: &CharacterWithWork) -> AnnotationOwner {
    AnnotationOwner {
        user_id: row.work_author_id,
        username: row.work_author_username.clone(),
    }
}

fn summary_of(row: &CharacterAnnotationRow) -> AnnotationSummary {
    AnnotationSummary {
        id: AnnotationId::Character(row.id),
        character: row.recognition.clone(),
        user_id: row.author_id,
        username: row.username.clone(),
        timestamp: row.updated_at,
        keypoints_count: row.keypoints.as_array().map_or(0, Vec::len),
    }
}

#[async_trait]
impl AnnotationStore for CharacterAnnotationStore {
    async fn load(&self, id: AnnotationId) -> Result<Option<Annotation>, PipelineError> {
        let Some(character_id) = Self::character_id(id) else {
            return Ok(None);
        };
        let Some(row) = CharacterRepo::find_with_work(&self.pool, character_id).await? else {
            return Ok(None);
        };
        embedded_annotation(
            character_id,
            &row.character.recognition,
            &row.character.keypoints,
            &row.character.annotation,
            owner_of(&row),
            row.character.updated_at,
        )
        .map(Some)
    }

    async fn save(&self, annotation: &Annotation) -> Result<(), PipelineError> {
        let character_id = Self::character_id(annotation.id).ok_or_else(|| {
            CoreError::Internal("standalone annotations are not stored on characters".into())
        })?;
        let keypoints = serde_json::to_value(&annotation.keypoints)
            .map_err(|e| CoreError::Internal(format!("Failed to encode keypoints: {e}")))?;
        let extra = Value::Object(annotation.extra.clone());

        CharacterRepo::set_annotation(&self.pool, character_id, &keypoints, &extra)
            .await?
            .ok_or(PipelineError::not_found("Character", character_id))?;
        Ok(())
    }

    async fn remove(&self, id: AnnotationId) -> Result<bool, PipelineError> {
        match Self::character_id(id) {
            Some(character_id) => Ok(CharacterRepo::clear_annotation(&self.pool, character_id).await?),
            None => Ok(false),
        }
    }

    async fn summaries(&self) -> Result<Vec<AnnotationSummary>, PipelineError> {
        let rows = CharacterRepo::list_annotated(&self.pool).await?;
        Ok(rows.iter().map(summary_of).collect())
    }
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Single entry point for annotation reads and writes.
#[derive(Clone)]
pub struct Annotations {
    standalone: Arc<dyn AnnotationStore>,
    embedded: Arc<dyn AnnotationStore>,
}

impl Annotations {
    pub fn new(standalone: Arc<dyn AnnotationStore>, embedded: Arc<dyn AnnotationStore>) -> Self {
        Self {
            standalone,
            embedded,
        }
    }

    fn backend(&self, id: AnnotationId) -> &dyn AnnotationStore {
        match id {
            AnnotationId::Standalone(_) => self.standalone.as_ref(),
            AnnotationId::Character(_) => self.embedded.as_ref(),
        }
    }

    /// Create a standalone annotation owned by `owner`.
    pub async fn create(
        &self,
        owner: &AnnotationOwner,
        payload: Value,
    ) -> Result<Annotation, PipelineError> {
        let annotation = Annotation::create(
            AnnotationId::new_standalone(),
            owner,
            payload,
            chrono::Utc::now(),
        )?;
        self.standalone.save(&annotation).await?;
        tracing::info!(annotation_id = %annotation.id, character = %annotation.character, "Annotation created");
        Ok(annotation)
    }

    /// Fetch an annotation the caller owns.
    pub async fn get(&self, id: AnnotationId, caller: DbId) -> Result<Annotation, PipelineError> {
        let annotation = self
            .backend(id)
            .load(id)
            .await?
            .ok_or_else(|| CoreError::NotFoundByKey {
                entity: "Annotation",
                key: id.to_string(),
            })?;
        annotation.ensure_owned_by(caller)?;
        Ok(annotation)
    }

    /// Merge `patch` over an annotation the caller owns.
    ///
    /// A character-backed annotation takes its label from the character's
    /// recognized text, so a patch may only repeat that label.
    pub async fn update(
        &self,
        id: AnnotationId,
        caller: DbId,
        patch: Value,
    ) -> Result<Annotation, PipelineError> {
        let existing = self.get(id, caller).await?;
        let updated = existing.merged(patch, chrono::Utc::now())?;
        if matches!(id, AnnotationId::Character(_)) && updated.character != existing.character {
            return Err(CoreError::Validation(format!(
                "character label is fixed to the recognized text '{}'; update the character instead",
                existing.character
            ))
            .into());
        }
        self.backend(id).save(&updated).await?;
        tracing::info!(annotation_id = %id, keypoints = updated.keypoints.len(), "Annotation updated");
        Ok(updated)
    }

    /// Delete an annotation the caller owns.
    pub async fn delete(&self, id: AnnotationId, caller: DbId) -> Result<(), PipelineError> {
        self.get(id, caller).await?;
        if !self.backend(id).remove(id).await? {
            return Err(CoreError::NotFoundByKey {
                entity: "Annotation",
                key: id.to_string(),
            }
            .into());
        }
        tracing::info!(annotation_id = %id, "Annotation deleted");
        Ok(())
    }

    /// Filtered, sorted, paginated summaries across both backings.
    pub async fn list(
        &self,
        query: &AnnotationListQuery,
    ) -> Result<Paged<AnnotationSummary>, PipelineError> {
        let mut items = self.standalone.summaries().await?;
        items.extend(self.embedded.summaries().await?);
        Ok(list_summaries(items, query))
    }
}
