// ==========================================
// Talhão APEX - reconciliation: validation and corrections
// ==========================================
// Counts the ten data-quality conditions over apex_base_1 and lists
// the rows an operator should review. Corrections are written back
// by id; rows are never rejected automatically.
// ==========================================

use crate::domain::validation::{AdjustmentCondition, AdjustmentReport, ConditionCount, ADJUSTMENT_COLUMNS};
use crate::engine::consist::ledger::APEX_BASE_1;
use crate::engine::error::{EngineError, EngineResult};
use crate::store::{ColumnDef, ColumnType, StoreResult, TabularStore, Value};
use tracing::info;

/// Evaluate every condition over the ledger
pub fn validate(store: &TabularStore) -> StoreResult<AdjustmentReport> {
    let ledger = store.read_table(APEX_BASE_1)?;
    let mut counts: Vec<usize> = vec![0; AdjustmentCondition::ALL.len()];
    let mut rows = Vec::new();

    for row in ledger.iter() {
        let mut any = false;
        for (slot, condition) in counts.iter_mut().zip(AdjustmentCondition::ALL) {
            if condition.matches(&row) {
                *slot += 1;
                any = true;
            }
        }
        if any {
            rows.push(
                ADJUSTMENT_COLUMNS
                    .iter()
                    .map(|c| row.get(c).clone())
                    .collect::<Vec<Value>>(),
            );
        }
    }

    let report = AdjustmentReport {
        total_rows: ledger.len(),
        counts: AdjustmentCondition::ALL
            .iter()
            .zip(counts)
            .map(|(condition, count)| ConditionCount {
                condition: *condition,
                label: condition.label(),
                count,
            })
            .collect(),
        columns: ADJUSTMENT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    };
    info!(
        total = report.total_rows,
        flagged = report.rows.len(),
        "ledger validated"
    );
    Ok(report)
}

/// Write operator corrections back to the ledger
///
/// Each row holds strings in adjustment-column order with the id first.
/// Empty and `None` cells become NULL; other cells take the column's type.
pub fn save_corrections(store: &TabularStore, rows: &[Vec<String>]) -> EngineResult<usize> {
    let existing = store.columns(APEX_BASE_1)?;
    let defs: Vec<ColumnDef> = ADJUSTMENT_COLUMNS[1..]
        .iter()
        .map(|name| {
            existing
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(name))
                .cloned()
                .unwrap_or_else(|| ColumnDef::new(*name, ColumnType::Text))
        })
        .collect();

    let mut updates = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() != ADJUSTMENT_COLUMNS.len() {
            return Err(EngineError::InvalidInput(format!(
                "correction row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                ADJUSTMENT_COLUMNS.len()
            )));
        }
        let id = row[0].trim().parse::<i64>().map_err(|_| {
            EngineError::InvalidInput(format!("correction row {} has invalid id {:?}", i + 1, row[0]))
        })?;
        let values = row[1..]
            .iter()
            .zip(&defs)
            .map(|(cell, def)| def.column_type.coerce(Value::from_input(cell)))
            .collect();
        updates.push((id, values));
    }

    let written = store.update_rows(APEX_BASE_1, &defs, &updates)?;
    info!(rows = written, "corrections saved");
    Ok(written)
}

/// Delete ledger rows by id
pub fn delete_rows(store: &TabularStore, ids: &[i64]) -> StoreResult<usize> {
    let keys: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
    store.delete_where_in(APEX_BASE_1, "id", &keys)
}
