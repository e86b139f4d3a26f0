//! Pipeline error taxonomy

use crate::llm::LlmError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Collaborator output did not have the expected structure
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(#[from] LlmError),

    #[error("merge verification rejected (confidence {confidence:.2}): {}", .issues.join("; "))]
    VerificationRejected { confidence: f64, issues: Vec<String> },

    /// A participant was changed by a concurrent merge
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for MemoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Cancelled => MemoryError::Cancelled,
            StorageError::Conflict(msg) => MemoryError::Conflict(msg),
            err if err.is_not_found() => MemoryError::NotFound(err.to_string()),
            err => MemoryError::Storage(err),
        }
    }
}

impl MemoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MemoryError::NotFound(_))
    }
}

/// Result type for pipeline operations
pub type MemoryResult<T> = Result<T, MemoryError>;
