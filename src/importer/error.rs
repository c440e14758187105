// ==========================================
// Talhão APEX - importer error types
// ==========================================
// Tooling: thiserror
// ==========================================

use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== file =====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0} (expected .xlsx/.xls/.csv)")]
    UnsupportedFormat(String),

    #[error("file read failed: {0}")]
    FileReadError(String),

    #[error("Excel parse failed: {0}")]
    ExcelParseError(String),

    #[error("CSV parse failed: {0}")]
    CsvParseError(String),

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("no header row in {0}")]
    MissingHeader(String),

    // ===== mapping =====
    #[error("source column not found: {0}")]
    MissingColumn(String),

    #[error("duplicate target column: {0}")]
    DuplicateColumn(String),

    // ===== store =====
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("import task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::TaskFailed(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
