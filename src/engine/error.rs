// ==========================================
// Talhão APEX - engine error types
// ==========================================
// Tooling: thiserror
// ==========================================

use crate::repository::error::RepositoryError;
use crate::store::error::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== input errors =====
    #[error("missing reference table: {0}")]
    MissingReference(String),

    #[error("invalid cost schedule {table}: {message}")]
    InvalidSchedule { table: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ===== runner errors =====
    #[error("pipeline cancelled")]
    Cancelled,

    #[error("pipeline worker failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Join(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
