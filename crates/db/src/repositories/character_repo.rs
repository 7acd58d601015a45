//! Repository for the `characters` table.

use inkstone_core::types::DbId;
use sqlx::PgPool;

use crate::models::character::{
    Character, CharacterAnnotationRow, CharacterWithWork, CreateCharacter, UpdateCharacter,
    SOURCE_OCR,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, work_id, style, strokes, stroke_order, recognition, source, \
                       x, y, width, height, sort_order, keypoints, annotation, \
                       collected_at, updated_at";

/// Character columns qualified with the `c` alias, for joins.
const C_COLUMNS: &str = "c.id, c.work_id, c.style, c.strokes, c.stroke_order, c.recognition, \
                         c.source, c.x, c.y, c.width, c.height, c.sort_order, c.keypoints, \
                         c.annotation, c.collected_at, c.updated_at";

/// Provides CRUD operations for characters.
pub struct CharacterRepo;

impl CharacterRepo {
    /// Insert a character on an existing work.
    pub async fn create(
        pool: &PgPool,
        work_id: DbId,
        input: &CreateCharacter,
    ) -> Result<Character, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let character = Self::insert_in_tx(&mut tx, work_id, input).await?;
        tx.commit().await?;
        Ok(character)
    }

    /// Insert a character inside a caller-owned transaction.
    pub(crate) async fn insert_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        work_id: DbId,
        input: &CreateCharacter,
    ) -> Result<Character, sqlx::Error> {
        let query = format!(
            "INSERT INTO characters
                (work_id, style, strokes, stroke_order, recognition, source,
                 x, y, width, height, sort_order, keypoints)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, '{SOURCE_OCR}'),
                     $7, $8, $9, $10, $11, COALESCE($12, '[]'::jsonb))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(work_id)
            .bind(&input.style)
            .bind(input.strokes)
            .bind(&input.stroke_order)
            .bind(&input.recognition)
            .bind(&input.source)
            .bind(input.x)
            .bind(input.y)
            .bind(input.width)
            .bind(input.height)
            .bind(input.sort_order)
            .bind(&input.keypoints)
            .fetch_one(&mut **tx)
            .await
    }

    /// Find a character by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Character>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters WHERE id = $1");
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a character together with its work's author and image details.
    pub async fn find_with_work(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CharacterWithWork>, sqlx::Error> {
        let query = format!(
            "SELECT {C_COLUMNS},
                    w.author_id AS work_author_id,
                    u.username AS work_author_username,
                    w.image_path AS work_image_path,
                    w.width AS work_width,
                    w.height AS work_height
             FROM characters c
             JOIN works w ON w.id = c.work_id
             JOIN users u ON u.id = w.author_id
             WHERE c.id = $1"
        );
        sqlx::query_as::<_, CharacterWithWork>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a work's characters in reading order.
    pub async fn list_by_work(pool: &PgPool, work_id: DbId) -> Result<Vec<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters WHERE work_id = $1 ORDER BY sort_order, id"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(work_id)
            .fetch_all(pool)
            .await
    }

    /// Next free `sort_order` on a work, for characters added by hand.
    pub async fn next_sort_order(pool: &PgPool, work_id: DbId) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM characters WHERE work_id = $1",
        )
        .bind(work_id)
        .fetch_one(pool)
        .await
    }

    /// Update a character. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCharacter,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET
                style = COALESCE($2, style),
                strokes = COALESCE($3, strokes),
                stroke_order = COALESCE($4, stroke_order),
                recognition = COALESCE($5, recognition),
                x = COALESCE($6, x),
                y = COALESCE($7, y),
                width = COALESCE($8, width),
                height = COALESCE($9, height),
                sort_order = COALESCE($10, sort_order),
                keypoints = COALESCE($11, keypoints)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(&input.style)
            .bind(input.strokes)
            .bind(&input.stroke_order)
            .bind(&input.recognition)
            .bind(input.x)
            .bind(input.y)
            .bind(input.width)
            .bind(input.height)
            .bind(input.sort_order)
            .bind(&input.keypoints)
            .fetch_optional(pool)
            .await
    }

    /// Replace the embedded annotation (keypoints plus remaining fields).
    pub async fn set_annotation(
        pool: &PgPool,
        id: DbId,
        keypoints: &serde_json::Value,
        annotation: &serde_json::Value,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "UPDATE characters SET keypoints = $2, annotation = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .bind(keypoints)
            .bind(annotation)
            .fetch_optional(pool)
            .await
    }

    /// Clear the embedded annotation. Returns `true` if a row was updated.
    pub async fn clear_annotation(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE characters SET keypoints = '[]'::jsonb, annotation = '{}'::jsonb WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every character carrying at least one keypoint, with its work author.
    pub async fn list_annotated(pool: &PgPool) -> Result<Vec<CharacterAnnotationRow>, sqlx::Error> {
        sqlx::query_as::<_, CharacterAnnotationRow>(
            "SELECT c.id, c.recognition, c.keypoints, c.annotation, c.updated_at,
                    w.author_id, u.username
             FROM characters c
             JOIN works w ON w.id = c.work_id
             JOIN users u ON u.id = w.author_id
             WHERE jsonb_array_length(c.keypoints) > 0
             ORDER BY c.updated_at DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Delete a character. Set memberships cascade. Returns `true` if a row
    /// was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM characters WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
