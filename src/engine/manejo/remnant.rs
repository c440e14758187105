// ==========================================
// Talhão APEX - evaluation: remnant stands (t700)
// ==========================================
// A remnant is a leftover piece of a stand re-coded after a partial
// harvest. Its final label comes from the canonical stand it was cut
// from, found through cod_chave_ref; when that stand is not in the
// remnant table the remnant keeps its own label.
// ==========================================

use crate::domain::stand_code::StandCode;
use crate::domain::types::StandKind;
use crate::engine::error::EngineResult;
use crate::engine::manejo::lookup::ColumnWriter;
use crate::store::{ColumnDef, Dataset, LoadMode, TabularStore, Value};
use std::collections::HashMap;
use tracing::info;

pub use crate::repository::report_repo::FINAL_LABEL_COLUMN;

fn key_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::text("cod_projeto"),
        ColumnDef::text("cod_talhao"),
        ColumnDef::text("cod_chave"),
        ColumnDef::text("remanescente"),
        ColumnDef::text("cod_chave_ref"),
    ]
}

/// Key values of one stand code, in `key_columns` order
pub fn remnant_keys(code: &StandCode) -> Vec<Value> {
    vec![
        Value::from(code.project()),
        Value::from(code.talhao_code()),
        Value::from(code.composite_key()),
        Value::from(code.kind().as_str()),
        Value::from(code.reference_key()),
    ]
}

/// Steps 30 and 33: remnant keys on any table with a Talhao column
///
/// A NULL stand code leaves every key NULL.
pub fn apply_remnant_keys(store: &TabularStore, table: &str) -> EngineResult<usize> {
    let stands = store.read_columns(table, &["Talhao"])?;
    let mut writer = ColumnWriter::new(key_columns());
    let mut remnants = 0usize;
    for row in stands.iter() {
        let values = match row.text("Talhao") {
            Some(t) => {
                let code = StandCode::new(t);
                if code.is_remnant() {
                    remnants += 1;
                }
                remnant_keys(&code)
            }
            None => vec![Value::Null; 5],
        };
        writer.push(row.rowid(), values);
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, remnants, "remnant keys derived");
    Ok(n)
}

/// Step 32: the remnant table holds every stand's code and label
pub fn build_remnant_table(store: &TabularStore, run_table: &str, remnant_table: &str) -> EngineResult<usize> {
    let source = store.read_columns(run_table, &["Talhao", "ManejoAPEX"])?;
    let dataset = Dataset::new(vec![ColumnDef::text("Talhao"), ColumnDef::text("ManejoAPEX")])
        .with_rows(source.rows.iter().map(|r| r.values.clone()).collect());
    let n = store.bulk_load(remnant_table, &dataset, LoadMode::Replace)?;
    info!(table = remnant_table, rows = n, "remnant table built");
    Ok(n)
}

/// Final label of one stand
pub fn resolve_label(
    kind: Option<&str>,
    own: Option<String>,
    reference_key: Option<&str>,
    canonical: Option<&HashMap<String, Option<String>>>,
) -> Option<String> {
    let is_remnant = kind == Some(StandKind::Remanescente.as_str());
    let inherited = match (is_remnant, canonical, reference_key) {
        (true, Some(index), Some(key)) => index.get(key).cloned().flatten(),
        _ => None,
    };
    inherited.or(own)
}

/// Step 34 (or 32 without reconciliation): ManejoAPEX_Final
pub fn resolve_final_labels(store: &TabularStore, run_table: &str, remnant_table: Option<&str>) -> EngineResult<usize> {
    let canonical = match remnant_table {
        Some(t) => {
            let rows = store.read_columns(t, &["cod_chave", "ManejoAPEX"])?;
            let mut index: HashMap<String, Option<String>> = HashMap::new();
            for row in rows.iter() {
                if let Some(key) = row.text("cod_chave") {
                    index.entry(key).or_insert_with(|| row.text("ManejoAPEX"));
                }
            }
            Some(index)
        }
        None => None,
    };

    let columns: &[&str] = if canonical.is_some() {
        &["ManejoAPEX", "remanescente", "cod_chave_ref"]
    } else {
        &["ManejoAPEX"]
    };
    let stands = store.read_columns(run_table, columns)?;

    let mut writer = ColumnWriter::new(vec![ColumnDef::text(FINAL_LABEL_COLUMN)]);
    let mut inherited = 0usize;
    for row in stands.iter() {
        let own = row.text("ManejoAPEX");
        let kind = row.text("remanescente");
        let reference_key = row.text("cod_chave_ref");
        let label = resolve_label(kind.as_deref(), own.clone(), reference_key.as_deref(), canonical.as_ref());
        if label != own {
            inherited += 1;
        }
        writer.push(row.rowid(), vec![Value::from(label)]);
    }
    let n = writer.write(store, run_table)?;
    info!(table = run_table, rows = n, inherited, "final labels resolved");
    Ok(n)
}
