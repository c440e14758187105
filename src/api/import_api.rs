// ==========================================
// Talhão APEX - import API
// ==========================================
// What the import dialog needs: list a workbook's sheets, preview
// headers and first rows, then import one or several files.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::importer::{
    FileParser, ImportRequest, ImportSummary, RawDataset, StoreTableImporter, TableImporter,
    UniversalFileParser,
};
use crate::store::TabularStore;
use calamine::{open_workbook_auto, Reader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Headers and leading rows of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

impl FilePreview {
    fn from_raw(raw: RawDataset, limit: usize) -> Self {
        let total_rows = raw.len();
        Self {
            headers: raw.headers,
            rows: raw.rows.into_iter().take(limit).collect(),
            total_rows,
        }
    }
}

pub struct ImportApi {
    importer: StoreTableImporter,
}

impl ImportApi {
    pub fn new(store: TabularStore) -> Self {
        Self {
            importer: StoreTableImporter::new(store),
        }
    }

    /// Sheet names of a workbook, in workbook order
    pub async fn list_sheets(&self, path: &str) -> ApiResult<Vec<String>> {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(ApiError::NotFound(path.display().to_string()));
        }
        tokio::task::spawn_blocking(move || {
            open_workbook_auto(&path)
                .map(|wb| wb.sheet_names())
                .map_err(|e| ApiError::ImportError(e.to_string()))
        })
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    }

    pub async fn preview(&self, path: &str, sheet: Option<String>, limit: usize) -> ApiResult<FilePreview> {
        let path = PathBuf::from(path);
        let raw = tokio::task::spawn_blocking(move || UniversalFileParser { sheet }.parse(Path::new(&path)))
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))??;
        Ok(FilePreview::from_raw(raw, limit))
    }

    pub async fn import_file(&self, request: ImportRequest) -> ApiResult<ImportSummary> {
        if request.table.trim().is_empty() {
            return Err(ApiError::InvalidInput("target table name is empty".to_string()));
        }
        Ok(self.importer.import_file(request).await?)
    }

    /// Per-file results; a failed file does not stop the others
    pub async fn import_files(&self, requests: Vec<ImportRequest>) -> ApiResult<Vec<Result<ImportSummary, String>>> {
        if requests.is_empty() {
            return Err(ApiError::InvalidInput("no files selected".to_string()));
        }
        Ok(self.importer.batch_import(requests).await)
    }
}
