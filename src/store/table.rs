// ==========================================
// Talhão APEX - row-oriented typed tables
// ==========================================
// Table: named, ordered, typed columns + rows keyed by SQLite rowid
// Dataset: rectangular input for bulk loads (no rowids yet)
// Column lookups are case-insensitive, matching SQLite name resolution
// ==========================================

use crate::store::value::{ColumnType, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

static NULL_VALUE: Value = Value::Null;

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }
}

/// Read access to one row by column name (used by the expression interpreter)
pub trait RowAccess {
    fn value(&self, column: &str) -> Option<&Value>;
}

/// One stored row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub rowid: i64,
    pub values: Vec<Value>,
}

/// A table read from (or destined for) the store
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<RowRef<'_>> {
        self.rows.get(idx).map(|row| RowRef { table: self, row })
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |row| RowRef { table: self, row })
    }

    /// Append a column (Null in every row); returns its index
    ///
    /// Returns the existing index when the column is already present.
    pub fn add_column(&mut self, def: ColumnDef) -> usize {
        if let Some(idx) = self.column_index(&def.name) {
            return idx;
        }
        self.columns.push(def);
        for row in &mut self.rows {
            row.values.push(Value::Null);
        }
        self.columns.len() - 1
    }

    /// Overwrite one cell, applying the column's affinity
    pub fn set(&mut self, row_idx: usize, col_idx: usize, value: Value) {
        let Some(def) = self.columns.get(col_idx) else {
            return;
        };
        let coerced = def.column_type.coerce(value);
        if let Some(cell) = self
            .rows
            .get_mut(row_idx)
            .and_then(|r| r.values.get_mut(col_idx))
        {
            *cell = coerced;
        }
    }

    /// First row whose `column` equals `key`
    pub fn find_first(&self, column: &str, key: &Value) -> Option<RowRef<'_>> {
        let idx = self.column_index(column)?;
        if key.is_null() {
            return None;
        }
        self.rows
            .iter()
            .find(|r| {
                crate::store::value::compare_values(&r.values[idx], key)
                    == Some(std::cmp::Ordering::Equal)
            })
            .map(|row| RowRef { table: self, row })
    }
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    row: &'a Row,
}

impl<'a> RowRef<'a> {
    pub fn rowid(&self) -> i64 {
        self.row.rowid
    }

    pub fn values(&self) -> &'a [Value] {
        &self.row.values
    }

    /// Cell by column name; Null when the column is absent
    pub fn get(&self, column: &str) -> &'a Value {
        self.table
            .column_index(column)
            .and_then(|i| self.row.values.get(i))
            .unwrap_or(&NULL_VALUE)
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    pub fn i64(&self, column: &str) -> Option<i64> {
        self.get(column).as_i64()
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).as_text()
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).as_date()
    }
}

impl RowAccess for RowRef<'_> {
    fn value(&self, column: &str) -> Option<&Value> {
        self.table
            .column_index(column)
            .and_then(|i| self.row.values.get(i))
    }
}

/// Rectangular dataset for bulk loads
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Bulk load mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    /// Drop and recreate the table
    Replace,
    /// Insert into the existing table (created with a surrogate id if absent)
    Append,
}
