// ==========================================
// Talhão APEX - tabular store error types
// ==========================================
// Shape errors are rejected before any write and surface to the caller;
// storage errors are logged by the stage runner and the step becomes a no-op
// Tooling: thiserror
// ==========================================

use thiserror::Error;

/// Expression evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("unknown column in expression: {0}")]
    UnknownColumn(String),

    #[error("invalid expression argument: {0}")]
    InvalidArgument(String),
}

/// Tabular store errors
#[derive(Error, Debug)]
pub enum StoreError {
    // ===== shape errors =====
    #[error("shape mismatch loading {table} (row {row}): expected {expected} fields, got {actual}")]
    ShapeMismatch {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    // ===== schema errors =====
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    // ===== evaluation errors =====
    #[error("expression error on {table}: {source}")]
    Expression {
        table: String,
        #[source]
        source: ExprError,
    },

    // ===== database errors =====
    #[error("database error: {0}")]
    Database(String),

    #[error("lock error: {0}")]
    LockError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => StoreError::Database(msg),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Result alias
pub type StoreResult<T> = Result<T, StoreError>;
