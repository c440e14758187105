// ==========================================
// Talhão APEX - import layer
// ==========================================
// Spreadsheet / CSV files -> store tables
// Supports: Excel (.xlsx/.xls), CSV
// ==========================================

pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod table_importer;

pub use error::{ImportError, ImportResult};
pub use field_mapper::{infer_type, ColumnMapping, FieldMapper};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawDataset, UniversalFileParser};
pub use table_importer::{ImportRequest, ImportSummary, StoreTableImporter, TableImporter};
