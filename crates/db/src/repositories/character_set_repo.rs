//! Repository for the `character_sets` and `characters_in_sets` tables.

use inkstone_core::pagination::PageRequest;
use inkstone_core::types::DbId;
use sqlx::PgPool;

use crate::models::character_set::{
    CharacterInSet, CharacterSet, CharacterSetWithCount, MoveOutcome, SetMember,
    UpdateCharacterSet,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, name, description, created_at, updated_at";

const MEMBER_COLUMNS: &str = "id, character_set_id, character_id, added_at";

/// Provides set CRUD and membership operations.
pub struct CharacterSetRepo;

impl CharacterSetRepo {
    /// Insert a set for `user_id`.
    ///
    /// Returns `None` if the user already owns a set with this name.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        name: &str,
        description: &str,
    ) -> Result<Option<CharacterSet>, sqlx::Error> {
        let query = format!(
            "INSERT INTO character_sets (user_id, name, description)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_character_sets_user_name DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterSet>(&query)
            .bind(user_id)
            .bind(name)
            .bind(description)
            .fetch_optional(pool)
            .await
    }

    /// Find a set by ID only if `user_id` owns it.
    pub async fn find_owned(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<CharacterSet>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM character_sets WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, CharacterSet>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find an owned set together with its member count.
    pub async fn find_owned_with_count(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<CharacterSetWithCount>, sqlx::Error> {
        sqlx::query_as::<_, CharacterSetWithCount>(
            "SELECT s.id, s.user_id, s.name, s.description, s.created_at, s.updated_at,
                    (SELECT COUNT(*) FROM characters_in_sets m WHERE m.character_set_id = s.id)
                        AS character_count
             FROM character_sets s
             WHERE s.id = $1 AND s.user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// List a user's sets, most recently updated first, with the total count.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        page: PageRequest,
    ) -> Result<(Vec<CharacterSetWithCount>, i64), sqlx::Error> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM character_sets WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        let sets = sqlx::query_as::<_, CharacterSetWithCount>(
            "SELECT s.id, s.user_id, s.name, s.description, s.created_at, s.updated_at,
                    (SELECT COUNT(*) FROM characters_in_sets m WHERE m.character_set_id = s.id)
                        AS character_count
             FROM character_sets s
             WHERE s.user_id = $1
             ORDER BY s.updated_at DESC, s.id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((sets, total))
    }

    /// Whether `user_id` owns a set called `name`, other than `exclude_id`.
    pub async fn name_taken(
        pool: &PgPool,
        user_id: DbId,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM character_sets
                WHERE user_id = $1 AND name = $2 AND ($3::bigint IS NULL OR id <> $3)
             )",
        )
        .bind(user_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(pool)
        .await
    }

    /// Update a set. Only non-`None` fields in `input` are applied.
    ///
    /// A rename onto an existing name fails with the
    /// `uq_character_sets_user_name` unique violation.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCharacterSet,
    ) -> Result<Option<CharacterSet>, sqlx::Error> {
        let query = format!(
            "UPDATE character_sets SET
                name = COALESCE($2, name),
                description = COALESCE($3, description)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CharacterSet>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// Delete a set. Memberships cascade. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM character_sets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add a character to a set and touch the set's `updated_at`.
    ///
    /// Returns `None`, without touching the set, if the pair already exists.
    pub async fn add_member(
        pool: &PgPool,
        set_id: DbId,
        character_id: DbId,
    ) -> Result<Option<CharacterInSet>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO characters_in_sets (character_set_id, character_id)
             VALUES ($1, $2)
             ON CONFLICT ON CONSTRAINT uq_characters_in_sets_pair DO NOTHING
             RETURNING {MEMBER_COLUMNS}"
        );
        let membership = sqlx::query_as::<_, CharacterInSet>(&query)
            .bind(set_id)
            .bind(character_id)
            .fetch_optional(&mut *tx)
            .await?;

        if membership.is_some() {
            Self::touch(&mut tx, set_id).await?;
        }

        tx.commit().await?;
        Ok(membership)
    }

    /// Remove a character from a set. Returns `true` if a membership was removed.
    pub async fn remove_member(
        pool: &PgPool,
        set_id: DbId,
        character_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM characters_in_sets WHERE character_set_id = $1 AND character_id = $2",
        )
        .bind(set_id)
        .bind(character_id)
        .execute(&mut *tx)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            Self::touch(&mut tx, set_id).await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    /// List a set's members, most recently added first, with the total count.
    pub async fn list_members(
        pool: &PgPool,
        set_id: DbId,
        page: PageRequest,
    ) -> Result<(Vec<SetMember>, i64), sqlx::Error> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM characters_in_sets WHERE character_set_id = $1")
                .bind(set_id)
                .fetch_one(pool)
                .await?;

        let members = sqlx::query_as::<_, SetMember>(
            "SELECT m.id AS membership_id, m.added_at,
                    c.id, c.work_id, c.style, c.strokes, c.stroke_order, c.recognition,
                    c.source, c.x, c.y, c.width, c.height, c.sort_order, c.keypoints,
                    c.annotation, c.collected_at, c.updated_at
             FROM characters_in_sets m
             JOIN characters c ON c.id = m.character_id
             WHERE m.character_set_id = $1
             ORDER BY m.added_at DESC, m.id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(set_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok((members, total))
    }

    /// Move a character from one of `user_id`'s sets to another.
    ///
    /// Both sets are locked and checked for ownership. The source membership
    /// is checked before the target one, then the existing membership row is
    /// reassigned with a single `UPDATE`. Any outcome
    /// other than [`MoveOutcome::Moved`] rolls the transaction back.
    pub async fn move_member(
        pool: &PgPool,
        user_id: DbId,
        source_set_id: DbId,
        target_set_id: DbId,
        character_id: DbId,
    ) -> Result<MoveOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Lock in id order so concurrent opposite moves cannot deadlock.
        let owned: Vec<DbId> = sqlx::query_scalar(
            "SELECT id FROM character_sets
             WHERE id IN ($1, $2) AND user_id = $3
             ORDER BY id
             FOR UPDATE",
        )
        .bind(source_set_id)
        .bind(target_set_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        if !owned.contains(&source_set_id) {
            tx.rollback().await?;
            return Ok(MoveOutcome::SourceSetNotFound);
        }
        if !owned.contains(&target_set_id) {
            tx.rollback().await?;
            return Ok(MoveOutcome::TargetSetNotFound);
        }

        let in_source: Option<DbId> = sqlx::query_scalar(
            "SELECT character_id FROM characters_in_sets
             WHERE character_set_id = $1 AND character_id = $2
             FOR UPDATE",
        )
        .bind(source_set_id)
        .bind(character_id)
        .fetch_optional(&mut *tx)
        .await?;
        if in_source.is_none() {
            tx.rollback().await?;
            return Ok(MoveOutcome::NotInSource);
        }

        let in_target: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM characters_in_sets
                WHERE character_set_id = $1 AND character_id = $2
             )",
        )
        .bind(target_set_id)
        .bind(character_id)
        .fetch_one(&mut *tx)
        .await?;
        if in_target {
            tx.rollback().await?;
            return Ok(MoveOutcome::AlreadyInTarget);
        }

        let query = format!(
            "UPDATE characters_in_sets SET character_set_id = $1, added_at = NOW()
             WHERE character_set_id = $2 AND character_id = $3
             RETURNING {MEMBER_COLUMNS}"
        );
        let moved = sqlx::query_as::<_, CharacterInSet>(&query)
            .bind(target_set_id)
            .bind(source_set_id)
            .bind(character_id)
            .fetch_one(&mut *tx)
            .await?;

        Self::touch(&mut tx, source_set_id).await?;
        Self::touch(&mut tx, target_set_id).await?;

        tx.commit().await?;
        Ok(MoveOutcome::Moved(moved))
    }

    async fn touch(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        set_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE character_sets SET updated_at = NOW() WHERE id = $1")
            .bind(set_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
