// ==========================================
// Talhão APEX - header mapping and type inference
// ==========================================
// Source header -> table column (rename + subset), then one
// ColumnType per column inferred from its non-empty cells:
//   Integer  every cell an integer without leading zeros
//   Real     every cell numeric (no leading-zero integer part)
//   Date     every cell ISO or dd/mm/yyyy
//   Text     otherwise
// Empty cells become Null and never vote.
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawDataset;
use crate::store::value::parse_datetime;
use crate::store::{ColumnDef, ColumnType, Dataset, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One source header renamed to a table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    mappings: Vec<ColumnMapping>,
}

impl FieldMapper {
    /// Keep every column under its own header
    pub fn identity() -> Self {
        Self::default()
    }

    /// Keep only the mapped columns, in mapping order
    pub fn new(mappings: Vec<ColumnMapping>) -> Self {
        Self { mappings }
    }

    /// (source index, target name) per output column
    fn plan(&self, raw: &RawDataset) -> ImportResult<Vec<(usize, String)>> {
        let find = |name: &str| {
            raw.headers
                .iter()
                .position(|h| h.trim().to_lowercase() == name.trim().to_lowercase())
        };

        let plan: Vec<(usize, String)> = if self.mappings.is_empty() {
            raw.headers
                .iter()
                .enumerate()
                .filter(|(_, h)| !h.trim().is_empty())
                .map(|(i, h)| (i, h.trim().to_string()))
                .collect()
        } else {
            self.mappings
                .iter()
                .map(|m| {
                    find(&m.source)
                        .map(|i| (i, m.target.trim().to_string()))
                        .ok_or_else(|| ImportError::MissingColumn(m.source.clone()))
                })
                .collect::<ImportResult<_>>()?
        };

        let mut seen = HashSet::new();
        for (_, name) in &plan {
            if !seen.insert(name.to_lowercase()) {
                return Err(ImportError::DuplicateColumn(name.clone()));
            }
        }
        Ok(plan)
    }

    /// Typed dataset ready for a bulk load
    pub fn map(&self, raw: &RawDataset) -> ImportResult<Dataset> {
        let plan = self.plan(raw)?;
        let columns: Vec<ColumnDef> = plan
            .iter()
            .map(|(idx, name)| {
                let cells = (0..raw.len()).map(|r| raw.cell(r, *idx));
                ColumnDef::new(name.clone(), infer_type(cells))
            })
            .collect();

        let rows = (0..raw.len())
            .map(|r| {
                plan.iter()
                    .zip(&columns)
                    .map(|((idx, _), def)| typed_value(raw.cell(r, *idx), def.column_type))
                    .collect()
            })
            .collect();

        Ok(Dataset::new(columns).with_rows(rows))
    }
}

fn has_leading_zero(s: &str) -> bool {
    let digits = s.trim_start_matches(['-', '+']);
    let int_part = digits.split('.').next().unwrap_or("");
    int_part.len() > 1 && int_part.starts_with('0')
}

fn is_integer(s: &str) -> bool {
    !has_leading_zero(s) && s.parse::<i64>().is_ok()
}

fn is_real(s: &str) -> bool {
    !has_leading_zero(s) && s.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false)
}

fn is_date(s: &str) -> bool {
    parse_datetime(s).is_some()
}

/// Column type of a set of cells
pub fn infer_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let values: Vec<&str> = cells.map(str::trim).filter(|c| !c.is_empty()).collect();
    if values.is_empty() {
        return ColumnType::Text;
    }
    if values.iter().all(|v| is_integer(v)) {
        ColumnType::Integer
    } else if values.iter().all(|v| is_real(v)) {
        ColumnType::Real
    } else if values.iter().all(|v| is_date(v)) {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

fn typed_value(cell: &str, column_type: ColumnType) -> Value {
    let t = cell.trim();
    if t.is_empty() {
        return Value::Null;
    }
    match column_type {
        ColumnType::Integer => t.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
        ColumnType::Real => t.parse::<f64>().map(Value::Real).unwrap_or(Value::Null),
        ColumnType::Date => parse_datetime(t)
            .map(|dt| Value::Date(dt.date()))
            .unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(t.to_string()),
    }
}
