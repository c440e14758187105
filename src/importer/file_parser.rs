// ==========================================
// Talhão APEX - file parsers
// ==========================================
// Excel (.xlsx/.xls, first sheet or a named one) and CSV (.csv)
// into a RawDataset: ordered headers + string cells.
// Excel date cells come out as ISO dates.
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Headers and string cells of one sheet or CSV file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text, empty when the row is short
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn push_unless_blank(&mut self, row: Vec<String>) {
        if row.iter().any(|v| !v.is_empty()) {
            self.rows.push(row);
        }
    }
}

pub trait FileParser: Send + Sync {
    fn parse(&self, path: &Path) -> ImportResult<RawDataset>;
}

fn check_exists(path: &Path) -> ImportResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ImportError::FileNotFound(path.display().to_string()))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse(&self, path: &Path) -> ImportResult<RawDataset> {
        check_exists(path)?;
        let ext = extension_of(path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::MissingHeader(path.display().to_string()));
        }

        let mut dataset = RawDataset {
            headers,
            rows: Vec::new(),
        };
        for record in reader.records() {
            let record = record?;
            dataset.push_unless_blank(record.iter().map(|v| v.trim().to_string()).collect());
        }
        Ok(dataset)
    }
}

// ==========================================
// Excel
// ==========================================
#[derive(Default)]
pub struct ExcelParser {
    /// Sheet to read; the first sheet when None
    pub sheet: Option<String>,
}

impl ExcelParser {
    pub fn with_sheet(sheet: impl Into<String>) -> Self {
        Self {
            sheet: Some(sheet.into()),
        }
    }
}

/// Excel serial day number to a date (1900 date system)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.split('T').next().unwrap_or_default().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

impl FileParser for ExcelParser {
    fn parse(&self, path: &Path) -> ImportResult<RawDataset> {
        check_exists(path)?;
        let ext = extension_of(path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(path)?;
        let sheet_names = workbook.sheet_names();
        let sheet = match &self.sheet {
            Some(name) => sheet_names
                .iter()
                .find(|s| s.as_str() == name)
                .cloned()
                .ok_or_else(|| ImportError::SheetNotFound(name.clone()))?,
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("workbook has no sheets".to_string()))?,
        };
        let range = workbook.worksheet_range(&sheet)?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or_else(|| ImportError::MissingHeader(format!("{}:{}", path.display(), sheet)))?
            .iter()
            .map(cell_text)
            .collect();

        let mut dataset = RawDataset {
            headers,
            rows: Vec::new(),
        };
        for row in rows {
            dataset.push_unless_blank(row.iter().map(cell_text).collect());
        }
        Ok(dataset)
    }
}

// ==========================================
// Dispatch by extension
// ==========================================
#[derive(Default)]
pub struct UniversalFileParser {
    pub sheet: Option<String>,
}

impl FileParser for UniversalFileParser {
    fn parse(&self, path: &Path) -> ImportResult<RawDataset> {
        match extension_of(path).as_str() {
            "csv" => CsvParser.parse(path),
            "xlsx" | "xls" => ExcelParser {
                sheet: self.sheet.clone(),
            }
            .parse(path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
