use thiserror::Error;

/// Crate-wide error taxonomy for the sync engine.
///
/// `Network` is the only retryable class; the orchestrator drives retries
/// with backoff and never surfaces it to callers during a background cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication required: {0}")]
    Auth(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the orchestrator should retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// Whether retrying can never succeed (malformed payload and the like).
    pub fn is_permanent(&self) -> bool {
        matches!(self, SyncError::Validation(_) | SyncError::InvalidInput(_))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<String> for SyncError {
    fn from(err: String) -> Self {
        SyncError::InvalidInput(err)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
