// ==========================================
// Talhão APEX - reconciliation: the stand ledger
// ==========================================
// apex_base_1 is the canonical input of the evaluation pipeline:
// one row per budgeted stand, keyed by a surrogate id, carrying
// resolved volume/stems/date, cadastral attributes and stand age.
// ==========================================

use crate::domain::stand_code::StandCode;
use crate::engine::consist::resolve::{APEX_BASE_0, CADASTRAL_COLUMNS, CADASTRO_FLORESTAL, TEMP_TABLES};
use crate::store::{ColumnDef, ColumnType, ColumnUpdate, Expr, NullMerge, StoreResult, TabularStore};
use tracing::info;

pub const APEX_BASE_1: &str = "apex_base_1";

/// Ledger schema (after the surrogate id)
pub fn ledger_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::text("DCR_Projeto"),
        ColumnDef::text("Regiao"),
        ColumnDef::text("Talhao"),
        ColumnDef::text("Regime"),
        ColumnDef::real("Area"),
        ColumnDef::date("DT_Plantio"),
        ColumnDef::date("DT_Medicao"),
        ColumnDef::real("Idade"),
        ColumnDef::real("IdadeClasse"),
        ColumnDef::text("ESP"),
        ColumnDef::text("DCR_MatGen"),
        ColumnDef::real("VTCC"),
        ColumnDef::real("Fustes"),
        ColumnDef::real("DIST_LP"),
        ColumnDef::real("DIST_PFRod"),
        ColumnDef::real("DIST_PFFer"),
        ColumnDef::real("DIST_LFRod"),
        ColumnDef::real("DIST_Total"),
    ]
}

/// Age class: whole years, half years, or the next year
///
/// fraction < 0.25 → floor, < 0.75 → floor + 0.5, otherwise floor + 1
pub fn age_class(age: f64) -> f64 {
    let floor = age.floor();
    let fraction = age - floor;
    if fraction < 0.25 {
        floor
    } else if fraction < 0.75 {
        floor + 0.5
    } else {
        floor + 1.0
    }
}

/// `age_class` as a row expression over `Idade` (NULL stays NULL)
pub fn age_class_expr() -> Expr {
    let floor = || Expr::col("Idade").floor();
    let fraction = || Expr::col("Idade") - floor();
    Expr::case(
        vec![
            (fraction().less_than(Expr::lit(0.25)), floor()),
            (fraction().less_than(Expr::lit(0.75)), floor() + Expr::lit(0.5)),
        ],
        Some(floor() + Expr::lit(1.0)),
    )
}

/// Create apex_base_1 from apex_base_0 and fill cadastral gaps
pub fn build_ledger(store: &TabularStore) -> StoreResult<usize> {
    store.recreate_table(APEX_BASE_1, &ledger_columns(), true)?;

    let base = store.read_columns(APEX_BASE_0, &["TalhaoAtual", "VTCC", "Fustes", "DT_Medicao"])?;
    let rows: Vec<_> = base.rows.into_iter().map(|r| r.values).collect();
    let inserted = store.insert_rows(APEX_BASE_1, &["Talhao", "VTCC", "Fustes", "DT_Medicao"], &rows)?;

    store.declarative_update(
        APEX_BASE_1,
        &[
            ColumnUpdate::new("Regiao", ColumnType::Text, StandCode::region_expr("Talhao")),
            ColumnUpdate::new("Regime", ColumnType::Text, StandCode::regime_marker_expr("Talhao")),
        ],
    )?;

    let filled = store.conditional_merge(&NullMerge {
        target: APEX_BASE_1.to_string(),
        source: TEMP_TABLES[5].to_string(),
        target_key: "Talhao".to_string(),
        source_key: "TalhaoAtual".to_string(),
        columns: CADASTRAL_COLUMNS
            .iter()
            .map(|c| (format!("{}_{}", c, CADASTRO_FLORESTAL), c.to_string()))
            .collect(),
    })?;

    info!(rows = inserted, filled, "apex_base_1 built");
    Ok(inserted)
}

/// Stand age in years and its class
pub fn compute_age(store: &TabularStore) -> StoreResult<usize> {
    store.declarative_update(
        APEX_BASE_1,
        &[
            ColumnUpdate::new(
                "Idade",
                ColumnType::Real,
                Expr::years_between(Expr::col("DT_Plantio"), Expr::col("DT_Medicao")),
            ),
            ColumnUpdate::new("IdadeClasse", ColumnType::Real, age_class_expr()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::table::{Row, Table};
    use crate::store::Value;

    #[test]
    fn test_age_class_boundaries() {
        assert_eq!(age_class(6.10), 6.0);
        assert_eq!(age_class(6.30), 6.5);
        assert_eq!(age_class(6.80), 7.0);
        assert_eq!(age_class(6.25), 6.5);
        assert_eq!(age_class(6.75), 7.0);
        assert_eq!(age_class(0.0), 0.0);
    }

    #[test]
    fn test_age_class_expr_matches_function() {
        let mut t = Table::new("apex_base_1", vec![ColumnDef::real("Idade")]);
        for (i, age) in [6.10, 6.30, 6.80, 12.74].iter().enumerate() {
            t.rows.push(Row { rowid: i as i64 + 1, values: vec![Value::Real(*age)] });
        }
        t.rows.push(Row { rowid: 9, values: vec![Value::Null] });

        let expr = age_class_expr();
        for (i, row) in t.iter().enumerate() {
            let got = expr.eval(&row).unwrap();
            match row.f64("Idade") {
                Some(age) => assert_eq!(got, Value::Real(age_class(age)), "row {}", i),
                None => assert!(got.is_null()),
            }
        }
    }
}
