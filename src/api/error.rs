// ==========================================
// Talhão APEX - API error types
// ==========================================
// Converts store, repository, importer and engine errors into
// messages an operator shell can show as they are.
// ==========================================

use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use crate::store::error::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ===== caller errors =====
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    // ===== data access =====
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("file import failed: {0}")]
    ImportError(String),

    // ===== pipelines =====
    #[error("pipeline failed: {0}")]
    PipelineError(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    ConfigError(String),

    // ===== generic =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(table) => ApiError::NotFound(format!("table {}", table)),
            StoreError::ColumnNotFound { table, column } => {
                ApiError::NotFound(format!("column {}.{}", table, column))
            }
            StoreError::ShapeMismatch { .. } | StoreError::InvalidIdentifier(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound(format!("{} (id={})", entity, id)),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            RepositoryError::Store(e) => ApiError::from(e),
            RepositoryError::Other(e) => ApiError::Other(e),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Store(e) => ApiError::from(e),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(e) => ApiError::from(e),
            EngineError::Repository(e) => ApiError::from(e),
            EngineError::Config(msg) => ApiError::ConfigError(msg),
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::Cancelled => ApiError::Cancelled,
            other => ApiError::PipelineError(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
