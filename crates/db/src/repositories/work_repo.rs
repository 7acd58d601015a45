//! Repository for the `works` table.

use inkstone_core::pagination::PageRequest;
use inkstone_core::types::DbId;
use sqlx::PgPool;

use crate::models::character::{Character, CreateCharacter};
use crate::models::work::{CreateWork, UpdateWork, Work, WorkListFilter};
use crate::repositories::character_repo::CharacterRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, author_id, title, description, image_path, style, dynasty, \
                       author_name, source_type, tags, status, width, height, views, \
                       ocr_artifact_path, created_at, updated_at";

/// Shared `WHERE` clause for listings; `$1..$4` are the filter values.
const LIST_FILTER: &str = "($1::text IS NULL OR status = $1) \
                           AND ($2::text IS NULL OR style = $2) \
                           AND ($3::bigint IS NULL OR author_id = $3) \
                           AND ($4::text IS NULL OR title ILIKE $4 OR description ILIKE $4)";

/// Provides CRUD operations for works.
pub struct WorkRepo;

impl WorkRepo {
    /// Insert a work together with its characters in one transaction.
    ///
    /// Either the work and every character commit, or nothing does.
    pub async fn create_with_characters(
        pool: &PgPool,
        input: &CreateWork,
        characters: &[CreateCharacter],
    ) -> Result<(Work, Vec<Character>), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO works
                (author_id, title, description, image_path, style, dynasty,
                 author_name, source_type, tags, width, height, ocr_artifact_path)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {COLUMNS}"
        );
        let work = sqlx::query_as::<_, Work>(&query)
            .bind(input.author_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.image_path)
            .bind(&input.style)
            .bind(&input.dynasty)
            .bind(&input.author_name)
            .bind(&input.source_type)
            .bind(&input.tags)
            .bind(input.width)
            .bind(input.height)
            .bind(&input.ocr_artifact_path)
            .fetch_one(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(characters.len());
        for character in characters {
            created.push(CharacterRepo::insert_in_tx(&mut tx, work.id, character).await?);
        }

        tx.commit().await?;
        Ok((work, created))
    }

    /// Find a work by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Work>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM works WHERE id = $1");
        sqlx::query_as::<_, Work>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Increment the view counter and return the updated row.
    pub async fn record_view(pool: &PgPool, id: DbId) -> Result<Option<Work>, sqlx::Error> {
        let query = format!("UPDATE works SET views = views + 1 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Work>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List works matching `filter`, newest first, with the total match count.
    pub async fn list(
        pool: &PgPool,
        filter: &WorkListFilter,
        page: PageRequest,
    ) -> Result<(Vec<Work>, i64), sqlx::Error> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let count_query = format!("SELECT COUNT(*) FROM works WHERE {LIST_FILTER}");
        let (total,): (i64,) = sqlx::query_as(&count_query)
            .bind(&filter.status)
            .bind(&filter.style)
            .bind(filter.author_id)
            .bind(&search)
            .fetch_one(pool)
            .await?;

        let query = format!(
            "SELECT {COLUMNS} FROM works WHERE {LIST_FILTER}
             ORDER BY created_at DESC, id DESC
             LIMIT $5 OFFSET $6"
        );
        let works = sqlx::query_as::<_, Work>(&query)
            .bind(&filter.status)
            .bind(&filter.style)
            .bind(filter.author_id)
            .bind(&search)
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok((works, total))
    }

    /// Update work metadata. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateWork,
    ) -> Result<Option<Work>, sqlx::Error> {
        let query = format!(
            "UPDATE works SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                style = COALESCE($4, style),
                dynasty = COALESCE($5, dynasty),
                author_name = COALESCE($6, author_name),
                source_type = COALESCE($7, source_type),
                tags = COALESCE($8, tags),
                status = COALESCE($9, status)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Work>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.style)
            .bind(&input.dynasty)
            .bind(&input.author_name)
            .bind(&input.source_type)
            .bind(&input.tags)
            .bind(&input.status)
            .fetch_optional(pool)
            .await
    }

    /// Delete a work and, through cascades, its characters and their set
    /// memberships. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM works WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every OCR artifact path still referenced by a work.
    pub async fn referenced_artifact_paths(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT ocr_artifact_path FROM works WHERE ocr_artifact_path IS NOT NULL",
        )
        .fetch_all(pool)
        .await
    }
}
