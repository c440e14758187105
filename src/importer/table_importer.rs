// ==========================================
// Talhão APEX - table importer
// ==========================================
// One file -> one store table:
//   1. parse (CSV / Excel sheet)
//   2. map headers, infer column types
//   3. bulk load (Replace or Append)
// Parsing and loading run on blocking threads; batch_import runs
// several files concurrently and reports each one separately.
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapping, FieldMapper};
use crate::importer::file_parser::{FileParser, UniversalFileParser};
use crate::store::{ColumnDef, LoadMode, TabularStore};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// What to import and where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub table: String,
    /// Excel sheet; the first sheet when None
    pub sheet: Option<String>,
    /// Header renames; every column is kept when empty
    pub mappings: Vec<ColumnMapping>,
    pub mode: LoadMode,
}

impl ImportRequest {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            sheet: None,
            mappings: Vec::new(),
            mode: LoadMode::Replace,
        }
    }

    pub fn sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn mappings(mut self, mappings: Vec<ColumnMapping>) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Outcome of one imported file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batch_id: String,
    pub file: String,
    pub table: String,
    pub mode: LoadMode,
    pub rows: usize,
    pub columns: Vec<ColumnDef>,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait TableImporter: Send + Sync {
    /// Import one file into one table
    async fn import_file(&self, request: ImportRequest) -> ImportResult<ImportSummary>;

    /// Import several files concurrently; one result per request, in order
    async fn batch_import(&self, requests: Vec<ImportRequest>) -> Vec<Result<ImportSummary, String>>;
}

pub struct StoreTableImporter {
    store: TabularStore,
}

impl StoreTableImporter {
    pub fn new(store: TabularStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TableImporter for StoreTableImporter {
    async fn import_file(&self, request: ImportRequest) -> ImportResult<ImportSummary> {
        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let file = request.path.display().to_string();
        info!(batch_id = %batch_id, file = %file, table = %request.table, "import started");

        let parse_request = request.clone();
        let dataset = tokio::task::spawn_blocking(move || -> ImportResult<_> {
            let parser = UniversalFileParser {
                sheet: parse_request.sheet.clone(),
            };
            let raw = parser.parse(&parse_request.path)?;
            FieldMapper::new(parse_request.mappings).map(&raw)
        })
        .await??;

        let columns = dataset.columns.clone();
        let store = self.store.clone();
        let table = request.table.clone();
        let mode = request.mode;
        let rows = tokio::task::spawn_blocking(move || store.bulk_load(&table, &dataset, mode))
            .await?
            .map_err(ImportError::from)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(batch_id = %batch_id, table = %request.table, rows, elapsed_ms, "import finished");
        Ok(ImportSummary {
            batch_id,
            file,
            table: request.table,
            mode,
            rows,
            columns,
            elapsed_ms,
        })
    }

    async fn batch_import(&self, requests: Vec<ImportRequest>) -> Vec<Result<ImportSummary, String>> {
        info!(count = requests.len(), "batch import started");

        let tasks = requests.into_iter().map(|request| {
            let file = request.path.display().to_string();
            async move {
                self.import_file(request).await.map_err(|e| {
                    error!(file = %file, error = %e, "file import failed");
                    format!("{}: {}", file, e)
                })
            }
        });
        let results = join_all(tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "batch import finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ColumnType, Value};
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn csv(lines: &[&str]) -> NamedTempFile {
        let mut f = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        f
    }

    #[tokio::test]
    async fn test_import_replace_then_append() {
        let db = NamedTempFile::new().unwrap();
        let store = TabularStore::new(db.path().to_str().unwrap());
        let importer = StoreTableImporter::new(store.clone());

        let first = csv(&["Talhão,VTCC,Idade", "11100112345R00,120.5,6", "11100112345-012,80,7"]);
        let summary = importer
            .import_file(ImportRequest::new(first.path(), "IFC").mappings(vec![
                ColumnMapping::new("Talhão", "Talhao"),
                ColumnMapping::new("VTCC", "VTCC"),
            ]))
            .await
            .unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns[1].column_type, ColumnType::Real);

        let second = csv(&["Talhao,VTCC", "11100112345-013,90"]);
        importer
            .import_file(ImportRequest::new(second.path(), "IFC").mode(LoadMode::Append))
            .await
            .unwrap();

        let t = store.read_table("IFC").unwrap();
        assert_eq!(t.len(), 3);
        assert!(!t.has_column("Idade"));
        assert_eq!(t.row(2).unwrap().get("VTCC"), &Value::Real(90.0));
    }

    #[tokio::test]
    async fn test_batch_import_reports_each_file() {
        let db = NamedTempFile::new().unwrap();
        let importer = StoreTableImporter::new(TabularStore::new(db.path().to_str().unwrap()));
        let ok = csv(&["Talhao,Area", "11100112345R00,12.5"]);

        let results = importer
            .batch_import(vec![
                ImportRequest::new(ok.path(), "CadastroFlorestal"),
                ImportRequest::new("does_not_exist.csv", "IFPC"),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().map(|s| s.rows), Ok(1));
        assert!(results[1].as_ref().unwrap_err().contains("does_not_exist.csv"));
    }
}
