//! Validation rules for user-curated character sets.

use crate::error::CoreError;

/// Maximum length of a character set name, in characters.
pub const MAX_SET_NAME_LEN: usize = 100;

/// Maximum length of a character set description, in characters.
pub const MAX_SET_DESCRIPTION_LEN: usize = 1000;

/// Default page size when listing a user's sets.
pub const DEFAULT_SETS_PER_PAGE: i64 = 12;

/// Default page size when listing the members of a set.
pub const DEFAULT_MEMBERS_PER_PAGE: i64 = 24;

/// Largest page size accepted by set listings.
pub const MAX_SETS_PER_PAGE: i64 = 100;

/// Validate and trim a set name.
pub fn validate_set_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Character set name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_SET_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Character set name must not exceed {MAX_SET_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a set description.
pub fn validate_set_description(description: &str) -> Result<(), CoreError> {
    if description.chars().count() > MAX_SET_DESCRIPTION_LEN {
        return Err(CoreError::Validation(format!(
            "Character set description must not exceed {MAX_SET_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}
