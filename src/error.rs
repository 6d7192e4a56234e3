//! Error types for the lesson generation pipeline.

use thiserror::Error;

/// Lesson store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Lesson not found: {0}")]
    LessonNotFound(String),

    #[error("Failed to encode lesson {lesson_id}: {message}")]
    Encode { lesson_id: String, message: String },

    #[error("Failed to decode stored lesson: {0}")]
    Decode(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Pipeline and API errors
///
/// The first five variants are the caller-facing taxonomy. Provider variants
/// describe a single backend call and are absorbed by retry/fallback before
/// they can reach a caller of `generate_plan`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Lesson assembly timed out after {elapsed_ms}ms ({completed}/{total} steps completed)")]
    AssemblyTimeout {
        elapsed_ms: u128,
        completed: usize,
        total: usize,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    ProviderRateLimit(String),

    #[error("Provider model not found: {0}")]
    ProviderModelNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl ApiError {
    /// True when the caller caused the failure (bad input), false for backend
    /// or configuration failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidRequest(_) | ApiError::StorageError(StorageError::LessonNotFound(_))
        )
    }

    /// Whether another attempt with the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::InvalidRequest(_) => false,
            ApiError::Configuration(_) => false,
            ApiError::ProviderNotConfigured(_) => false,
            ApiError::ProviderAuthFailed(_) => false,
            ApiError::ProviderModelNotFound(_) => false,
            ApiError::AssemblyTimeout { .. } => false,
            ApiError::StorageError(_) => false,
            ApiError::ProviderRateLimit(_) => true,
            ApiError::ProviderRequestFailed(_) => true,
            ApiError::ProviderError(_) => true,
            ApiError::Retrieval(_) => true,
            ApiError::Generation(_) => true,
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::Configuration(err.to_string())
    }
}
