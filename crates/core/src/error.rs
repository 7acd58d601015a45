use crate::types::DbId;

/// Domain error taxonomy shared by every layer.
///
/// The first group covers user-fixable input and resource-state problems,
/// the second group covers failures of the remote recognition services and
/// of the process configuration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Entity not found: {entity} with key {key}")]
    NotFoundByKey { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension '{0}'")]
    InvalidExtension(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidEncoding(String),

    #[error("OCR service error: {0}")]
    OcrService(String),

    #[error("Vision service error: {0}")]
    VisionService(String),

    #[error("Analysis parse error: {0}")]
    AnalysisParse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
