// ==========================================
// Talhão APEX - evaluation: reference lookups
// ==========================================
// Reference tables are small and read whole. A missing reference table
// is logged and behaves as an empty one, so every lookup against it
// falls back to its default (or NULL).
// Lookups take the first matching row in rowid order.
// ==========================================

use crate::domain::types::ElevationClass;
use crate::engine::error::EngineResult;
use crate::store::{key_of, ColumnDef, RowRef, Table, TabularStore, Value};
use std::collections::HashMap;
use tracing::warn;

pub const ELEVATION_TABLE: &str = "Elevacao";

/// Read a reference table, or an empty table when it does not exist
pub fn reference_table(store: &TabularStore, name: &str) -> EngineResult<Table> {
    if store.table_exists(name)? {
        Ok(store.read_table(name)?)
    } else {
        warn!(table = name, "reference table missing, lookups use defaults");
        Ok(Table::new(name, Vec::new()))
    }
}

/// First-match index over one key column
pub struct KeyIndex<'a> {
    table: &'a Table,
    positions: HashMap<String, usize>,
}

impl<'a> KeyIndex<'a> {
    pub fn new(table: &'a Table, column: &str) -> Self {
        let mut positions = HashMap::new();
        if let Some(col) = table.column_index(column) {
            for (i, row) in table.rows.iter().enumerate() {
                if let Some(k) = key_of(&row.values[col]) {
                    positions.entry(k).or_insert(i);
                }
            }
        }
        Self { table, positions }
    }

    pub fn row(&self, key: &Value) -> Option<RowRef<'a>> {
        let k = key_of(key)?;
        self.positions.get(&k).and_then(|&i| self.table.row(i))
    }

    pub fn row_by_text(&self, key: &str) -> Option<RowRef<'a>> {
        self.positions.get(key).and_then(|&i| self.table.row(i))
    }

    /// `column` of the row matching `key`
    pub fn f64(&self, key: &Value, column: &str) -> Option<f64> {
        self.row(key).and_then(|r| r.f64(column))
    }
}

/// `value_col` at the greatest `key_col` ≤ x (first row among ties)
pub fn floor_lookup(table: &Table, key_col: &str, value_col: &str, x: f64) -> Option<f64> {
    let mut best: Option<(f64, RowRef<'_>)> = None;
    for row in table.iter() {
        let Some(k) = row.f64(key_col) else { continue };
        if k > x {
            continue;
        }
        if best.as_ref().map_or(true, |(bk, _)| k > *bk) {
            best = Some((k, row));
        }
    }
    best.and_then(|(_, row)| row.f64(value_col))
}

/// `value_col` at the smallest `key_col` (first row among ties)
pub fn min_key_lookup(table: &Table, key_col: &str, value_col: &str) -> Option<f64> {
    let mut best: Option<(f64, RowRef<'_>)> = None;
    for row in table.iter() {
        let Some(k) = row.f64(key_col) else { continue };
        if best.as_ref().map_or(true, |(bk, _)| k < *bk) {
            best = Some((k, row));
        }
    }
    best.and_then(|(_, row)| row.f64(value_col))
}

/// Elevation class per region code (Elevacao: Regiao, Elev)
///
/// Region codes compare case-insensitively. A region is low when any
/// of its rows carries the low-region label; unknown regions are high.
pub struct ElevationIndex {
    low: HashMap<String, bool>,
}

impl ElevationIndex {
    pub fn new(table: &Table) -> Self {
        let mut low = HashMap::new();
        for row in table.iter() {
            let Some(region) = row.text("Regiao") else { continue };
            let is_low = row
                .text("Elev")
                .map_or(false, |e| ElevationClass::from_label(&e) == ElevationClass::Low);
            let entry = low.entry(region.trim().to_uppercase()).or_insert(false);
            *entry |= is_low;
        }
        Self { low }
    }

    pub fn load(store: &TabularStore) -> EngineResult<Self> {
        Ok(Self::new(&reference_table(store, ELEVATION_TABLE)?))
    }

    pub fn class_of(&self, region: Option<&str>) -> ElevationClass {
        let low = region
            .and_then(|r| self.low.get(&r.trim().to_uppercase()))
            .copied()
            .unwrap_or(false);
        if low {
            ElevationClass::Low
        } else {
            ElevationClass::High
        }
    }
}

/// Division with SQL semantics: NULL operands or a zero divisor give NULL
pub fn div(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Round half away from zero to `digits` decimals
pub fn round_to(x: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (x * scale).round() / scale
}

/// Per-row results of one step, written back by rowid
pub struct ColumnWriter {
    defs: Vec<ColumnDef>,
    updates: Vec<(i64, Vec<Value>)>,
}

impl ColumnWriter {
    pub fn new(defs: Vec<ColumnDef>) -> Self {
        Self {
            defs,
            updates: Vec::new(),
        }
    }

    pub fn push(&mut self, rowid: i64, values: Vec<Value>) {
        self.updates.push((rowid, values));
    }

    pub fn write(self, store: &TabularStore, table: &str) -> EngineResult<usize> {
        Ok(store.update_rows(table, &self.defs, &self.updates)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Row;

    fn breakpoints() -> Table {
        let mut t = Table::new(
            "CustosColheitaBO",
            vec![ColumnDef::real("PROD"), ColumnDef::real("POND")],
        );
        for (i, (prod, pond)) in [(150.0, 25.0), (50.0, 40.0), (100.0, 30.0), (100.0, 31.0)]
            .iter()
            .enumerate()
        {
            t.rows.push(Row {
                rowid: i as i64 + 1,
                values: vec![Value::Real(*prod), Value::Real(*pond)],
            });
        }
        t
    }

    #[test]
    fn test_floor_lookup_selects_greatest_breakpoint_below() {
        let t = breakpoints();
        assert_eq!(floor_lookup(&t, "PROD", "POND", 120.0), Some(30.0));
        assert_eq!(floor_lookup(&t, "PROD", "POND", 150.0), Some(25.0));
        assert_eq!(floor_lookup(&t, "PROD", "POND", 49.9), None);
        assert_eq!(min_key_lookup(&t, "PROD", "POND"), Some(40.0));
    }

    #[test]
    fn test_key_index_first_match_and_numeric_keys() {
        let mut t = Table::new("CustoTerra", vec![ColumnDef::text("Regiao"), ColumnDef::real("Custo")]);
        for (i, (r, c)) in [("BO", 1.0), ("SA", 2.0), ("BO", 3.0)].iter().enumerate() {
            t.rows.push(Row {
                rowid: i as i64 + 1,
                values: vec![Value::from(*r), Value::Real(*c)],
            });
        }
        let idx = KeyIndex::new(&t, "Regiao");
        assert_eq!(idx.f64(&Value::from("BO"), "Custo"), Some(1.0));
        assert_eq!(idx.f64(&Value::from("XX"), "Custo"), None);
        assert_eq!(idx.f64(&Value::Null, "Custo"), None);
    }

    #[test]
    fn test_elevation_index_any_low_row_wins() {
        let mut t = Table::new(ELEVATION_TABLE, vec![ColumnDef::text("Regiao"), ColumnDef::text("Elev")]);
        for (i, (r, e)) in [("BO", "Região Alta"), ("bo", "REGIÃO BAIXA"), ("SA", "Região Alta")]
            .iter()
            .enumerate()
        {
            t.rows.push(Row {
                rowid: i as i64 + 1,
                values: vec![Value::from(*r), Value::from(*e)],
            });
        }
        let idx = ElevationIndex::new(&t);
        assert_eq!(idx.class_of(Some("BO")), ElevationClass::Low);
        assert_eq!(idx.class_of(Some("SA")), ElevationClass::High);
        assert_eq!(idx.class_of(None), ElevationClass::High);
    }

    #[test]
    fn test_div_and_round() {
        assert_eq!(div(Some(1.0), Some(0.0)), None);
        assert_eq!(div(None, Some(2.0)), None);
        assert_eq!(div(Some(1.0), Some(4.0)), Some(0.25));
        assert_eq!(round_to(1.25, 1), 1.3);
        assert_eq!(round_to(6.66, 1), 6.7);
    }
}
