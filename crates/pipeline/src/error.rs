use inkstone_core::error::CoreError;

/// Errors from pipeline operations that touch the database.
///
/// Database errors stay unwrapped so the HTTP layer can classify
/// constraint violations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PipelineError {
    /// Shorthand for a `NotFound` core error.
    pub fn not_found(entity: &'static str, id: inkstone_core::types::DbId) -> Self {
        Self::Core(CoreError::NotFound { entity, id })
    }
}
