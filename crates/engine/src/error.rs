//! Engine error taxonomy.

use aquatrack_domain::DomainError;
use aquatrack_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad window, inverted dates, unknown assignment. No recompute happens.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown batch/assignment referenced by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// No TGC/mortality model reachable from the batch; the job fails fast.
    #[error("missing master data: {0}")]
    MissingMasterData(String),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => EngineError::NotFound(what),
            StorageError::MissingMasterData(what) => EngineError::MissingMasterData(what),
            other => EngineError::Storage(other),
        }
    }
}

impl From<EngineError> for DomainError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => DomainError::Validation(msg),
            EngineError::NotFound(what) => DomainError::NotFound(what),
            EngineError::MissingMasterData(msg) => DomainError::BusinessLogic(msg),
            EngineError::Storage(err) => DomainError::Database(err.to_string()),
        }
    }
}
