//! Character set and membership models.

use inkstone_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::character::Character;

/// A row from the `character_sets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CharacterSet {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A set with the number of characters it holds.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CharacterSetWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub set: CharacterSet,
    pub character_count: i64,
}

/// DTO for creating a set. The owner comes from the authenticated caller.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCharacterSet {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// DTO for updating a set. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCharacterSet {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A row from the `characters_in_sets` join table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct CharacterInSet {
    pub id: DbId,
    pub character_set_id: DbId,
    pub character_id: DbId,
    pub added_at: Timestamp,
}

/// One member of a set listing: the membership plus its character.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SetMember {
    pub membership_id: DbId,
    pub added_at: Timestamp,
    #[sqlx(flatten)]
    pub character: Character,
}

/// Request body for adding a character to a set.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMember {
    pub character_id: DbId,
}

/// Request body for moving a character between two sets.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveMember {
    pub character_id: DbId,
    pub target_set_id: DbId,
}

/// Result of a membership move. Every variant except `Moved` leaves the
/// database unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(CharacterInSet),
    SourceSetNotFound,
    TargetSetNotFound,
    NotInSource,
    AlreadyInTarget,
}
