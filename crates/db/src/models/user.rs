//! User entity model.

use inkstone_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub created_at: Timestamp,
}

/// DTO for registering a user mirrored from the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
}
