//! User-owned character sets and their memberships.
//!
//! Sets belong to one user. A set the caller does not own is reported as
//! not found, so set ids of other users are not disclosed.

use inkstone_core::character_set::{
    validate_set_description, validate_set_name, DEFAULT_MEMBERS_PER_PAGE, DEFAULT_SETS_PER_PAGE,
    MAX_SETS_PER_PAGE,
};
use inkstone_core::error::CoreError;
use inkstone_core::pagination::{PageRequest, Paged, Pagination};
use inkstone_core::types::DbId;
use inkstone_db::models::character_set::{
    CharacterInSet, CharacterSet, CharacterSetWithCount, CreateCharacterSet, MoveOutcome,
    SetMember, UpdateCharacterSet,
};
use inkstone_db::repositories::{CharacterRepo, CharacterSetRepo};
use sqlx::PgPool;

use crate::error::PipelineError;

const SET: &str = "Character set";

#[derive(Debug, Clone)]
pub struct CharacterSetCurator {
    pool: PgPool,
}

impl CharacterSetCurator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_set(
        &self,
        owner: DbId,
        input: &CreateCharacterSet,
    ) -> Result<CharacterSet, PipelineError> {
        let name = validate_set_name(&input.name)?;
        validate_set_description(&input.description)?;

        let set = CharacterSetRepo::create(&self.pool, owner, &name, input.description.trim())
            .await?
            .ok_or_else(|| duplicate_name(&name))?;
        tracing::info!(set_id = set.id, user_id = owner, "Character set created");
        Ok(set)
    }

    pub async fn get_set(&self, owner: DbId, id: DbId) -> Result<CharacterSetWithCount, PipelineError> {
        CharacterSetRepo::find_owned_with_count(&self.pool, id, owner)
            .await?
            .ok_or(PipelineError::not_found(SET, id))
    }

    pub async fn list_sets(
        &self,
        owner: DbId,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Paged<CharacterSetWithCount>, PipelineError> {
        let request =
            PageRequest::normalize(page, per_page, DEFAULT_SETS_PER_PAGE, MAX_SETS_PER_PAGE);
        let (items, total) = CharacterSetRepo::list_by_user(&self.pool, owner, request).await?;
        Ok(Paged {
            items,
            pagination: Pagination::new(total, request),
        })
    }

    /// Rename and/or re-describe a set. A new name must still be unique
    /// among the owner's sets.
    pub async fn update_set(
        &self,
        owner: DbId,
        id: DbId,
        input: &UpdateCharacterSet,
    ) -> Result<CharacterSet, PipelineError> {
        self.owned(owner, id).await?;

        let name = input.name.as_deref().map(validate_set_name).transpose()?;
        if let Some(description) = input.description.as_deref() {
            validate_set_description(description)?;
        }
        if let Some(name) = name.as_deref() {
            if CharacterSetRepo::name_taken(&self.pool, owner, name, Some(id)).await? {
                return Err(duplicate_name(name).into());
            }
        }

        let update = UpdateCharacterSet {
            name,
            description: input.description.as_deref().map(|d| d.trim().to_string()),
        };
        let set = CharacterSetRepo::update(&self.pool, id, &update)
            .await?
            .ok_or(PipelineError::not_found(SET, id))?;
        tracing::info!(set_id = id, "Character set updated");
        Ok(set)
    }

    pub async fn delete_set(&self, owner: DbId, id: DbId) -> Result<(), PipelineError> {
        self.owned(owner, id).await?;
        if !CharacterSetRepo::delete(&self.pool, id).await? {
            return Err(PipelineError::not_found(SET, id));
        }
        tracing::info!(set_id = id, "Character set deleted");
        Ok(())
    }

    pub async fn add_member(
        &self,
        owner: DbId,
        set_id: DbId,
        character_id: DbId,
    ) -> Result<CharacterInSet, PipelineError> {
        self.owned(owner, set_id).await?;
        if CharacterRepo::find_by_id(&self.pool, character_id).await?.is_none() {
            return Err(PipelineError::not_found("Character", character_id));
        }

        let membership = CharacterSetRepo::add_member(&self.pool, set_id, character_id)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "Character {character_id} is already in set {set_id}"
                ))
            })?;
        tracing::info!(set_id, character_id, "Character added to set");
        Ok(membership)
    }

    pub async fn remove_member(
        &self,
        owner: DbId,
        set_id: DbId,
        character_id: DbId,
    ) -> Result<(), PipelineError> {
        self.owned(owner, set_id).await?;
        if !CharacterSetRepo::remove_member(&self.pool, set_id, character_id).await? {
            return Err(not_in_set(character_id, set_id).into());
        }
        tracing::info!(set_id, character_id, "Character removed from set");
        Ok(())
    }

    pub async fn list_members(
        &self,
        owner: DbId,
        set_id: DbId,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Paged<SetMember>, PipelineError> {
        self.owned(owner, set_id).await?;
        let request =
            PageRequest::normalize(page, per_page, DEFAULT_MEMBERS_PER_PAGE, MAX_SETS_PER_PAGE);
        let (items, total) = CharacterSetRepo::list_members(&self.pool, set_id, request).await?;
        Ok(Paged {
            items,
            pagination: Pagination::new(total, request),
        })
    }

    /// Move a character between two of the caller's sets atomically.
    pub async fn move_member(
        &self,
        owner: DbId,
        source_set_id: DbId,
        target_set_id: DbId,
        character_id: DbId,
    ) -> Result<CharacterInSet, PipelineError> {
        if source_set_id == target_set_id {
            return Err(CoreError::Validation(
                "Source and target set must differ".to_string(),
            )
            .into());
        }

        let outcome = CharacterSetRepo::move_member(
            &self.pool,
            owner,
            source_set_id,
            target_set_id,
            character_id,
        )
        .await?;

        match outcome {
            MoveOutcome::Moved(membership) => {
                tracing::info!(
                    character_id,
                    source_set_id,
                    target_set_id,
                    "Character moved between sets",
                );
                Ok(membership)
            }
            MoveOutcome::SourceSetNotFound => Err(PipelineError::not_found(SET, source_set_id)),
            MoveOutcome::TargetSetNotFound => Err(PipelineError::not_found(SET, target_set_id)),
            MoveOutcome::NotInSource => Err(not_in_set(character_id, source_set_id).into()),
            MoveOutcome::AlreadyInTarget => Err(CoreError::Conflict(format!(
                "Character {character_id} is already in set {target_set_id}"
            ))
            .into()),
        }
    }

    async fn owned(&self, owner: DbId, id: DbId) -> Result<CharacterSet, PipelineError> {
        CharacterSetRepo::find_owned(&self.pool, id, owner)
            .await?
            .ok_or(PipelineError::not_found(SET, id))
    }
}

fn duplicate_name(name: &str) -> CoreError {
    CoreError::Conflict(format!("A character set named '{name}' already exists"))
}

fn not_in_set(character_id: DbId, set_id: DbId) -> CoreError {
    CoreError::NotFoundByKey {
        entity: "Set membership",
        key: format!("character {character_id} in set {set_id}"),
    }
}
