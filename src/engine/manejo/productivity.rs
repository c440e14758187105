// ==========================================
// Talhão APEX - evaluation: spacing, productivity and coppice losses
// ==========================================
// Vol7 projects the measured volume to age 7 with the regional
// productivity curve. Vol7_2ROT is what the stand would yield if it
// regrows from the stump; Vol7_1ROT if it is replanted.
// ==========================================

use crate::domain::parameters::ManagementParameters;
use crate::domain::types::region_by_code;
use crate::engine::error::EngineResult;
use crate::engine::manejo::lookup::{div, floor_lookup, min_key_lookup, reference_table, round_to, ColumnWriter};
use crate::store::{ColumnDef, TabularStore, Value};
use tracing::info;

pub const PRODUCTIVITY_CURVE_TABLE: &str = "CurvaProdutividade";
pub const SPROUTING_INDEX_TABLE: &str = "IndiceBrotacao";

/// Basal spacing (m²) when ESP cannot be read
pub const DEFAULT_BASAL_SPACING: f64 = 9.0;

/// Curve value when the region or age class has no entry
pub const DEFAULT_CURVE: f64 = 130.0;

/// Age below which the measured volume is projected forward
pub const PROJECTION_AGE: f64 = 7.0;

/// Area per tree from a spacing such as `3 X 2,5`
pub fn basal_spacing(esp: Option<&str>) -> f64 {
    let Some(esp) = esp else {
        return DEFAULT_BASAL_SPACING;
    };
    let normalized = esp.to_ascii_uppercase().replace(',', ".");
    let parts: Vec<&str> = normalized.split('X').map(str::trim).collect();
    match parts.as_slice() {
        [a, b] => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(a), Ok(b)) => round_to(a * b, 1),
            _ => DEFAULT_BASAL_SPACING,
        },
        _ => DEFAULT_BASAL_SPACING,
    }
}

/// Curve value as a growth factor (always ≥ 1)
pub fn curve_factor(curve: f64) -> f64 {
    if curve < 100.0 {
        1.0 / (curve / 100.0)
    } else {
        curve / 100.0
    }
}

/// Volume at age 7
///
/// Young stands grow into it; older stands are discounted by the same
/// factor. A stand with no usable age or volume yields 0.
pub fn volume_at_seven(age: Option<f64>, vtcc: Option<f64>, factor: f64) -> Option<f64> {
    match (age, vtcc) {
        (Some(a), v) if a < PROJECTION_AGE => v.map(|v| v * factor),
        (_, Some(v)) if v != 0.0 => Some((1.0 - (factor - 1.0)) * v),
        _ => Some(0.0),
    }
}

/// Share of the measured volume retained when the stand regrows
pub fn coppice_factor(sprouting_pct: Option<f64>, regime: Option<&str>, params: &ManagementParameters) -> Option<f64> {
    let base = sprouting_pct? / 100.0
        * (params.genetic_loss_pct / 100.0)
        * (params.mechanized_harvest_pct / 100.0);
    if regime.map(str::trim) == Some("R") {
        Some(base * params.second_rotation_pct / 100.0)
    } else {
        Some(base)
    }
}

/// Step 10: EspAB and QTDArvIdeal
pub fn apply_basal_spacing(store: &TabularStore, table: &str) -> EngineResult<usize> {
    let stands = store.read_columns(table, &["ESP"])?;
    let mut writer = ColumnWriter::new(vec![ColumnDef::real("EspAB"), ColumnDef::real("QTDArvIdeal")]);
    for row in stands.iter() {
        let spacing = basal_spacing(row.text("ESP").as_deref());
        let ideal = div(Some(10_000.0), Some(spacing)).map(|q| round_to(q, 1));
        writer.push(row.rowid(), vec![Value::Real(spacing), Value::from(ideal)]);
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, "basal spacing computed");
    Ok(n)
}

/// Step 11: Curva, Fator and Vol7
pub fn apply_productivity(store: &TabularStore, table: &str) -> EngineResult<usize> {
    let curve = reference_table(store, PRODUCTIVITY_CURVE_TABLE)?;
    let stands = store.read_columns(table, &["Regiao", "IdadeClasse", "Idade", "VTCC"])?;

    let mut writer = ColumnWriter::new(vec![
        ColumnDef::real("Curva"),
        ColumnDef::real("Fator"),
        ColumnDef::real("Vol7"),
    ]);
    let mut defaulted = 0usize;
    for row in stands.iter() {
        let long_name = row
            .text("Regiao")
            .and_then(|code| region_by_code(&code))
            .map(|r| r.long_name);
        let age_class = row.get("IdadeClasse");
        let looked_up = long_name.and_then(|col| {
            curve
                .find_first("Idade", age_class)
                .and_then(|r| r.f64(col))
        });
        let value = looked_up.unwrap_or_else(|| {
            defaulted += 1;
            DEFAULT_CURVE
        });
        let factor = curve_factor(value);
        let vol7 = volume_at_seven(row.f64("Idade"), row.f64("VTCC"), factor);
        writer.push(
            row.rowid(),
            vec![Value::Real(value), Value::Real(factor), Value::from(vol7)],
        );
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, defaulted, "productivity projected");
    Ok(n)
}

/// Step 12: FatoresBrotacao, FatoresTalhadia, Vol7_2ROT and Vol7_1ROT
pub fn apply_coppice_losses(store: &TabularStore, table: &str, params: &ManagementParameters) -> EngineResult<usize> {
    let index = reference_table(store, SPROUTING_INDEX_TABLE)?;
    let youngest = min_key_lookup(&index, "Idade", "Perda");
    let stands = store.read_columns(table, &["Idade", "Regime", "Vol7"])?;

    let mut writer = ColumnWriter::new(vec![
        ColumnDef::real("FatoresBrotacao"),
        ColumnDef::real("FatoresTalhadia"),
        ColumnDef::real("Vol7_2ROT"),
        ColumnDef::real("Vol7_1ROT"),
    ]);
    for row in stands.iter() {
        let sprouting = row
            .f64("Idade")
            .and_then(|age| floor_lookup(&index, "Idade", "Perda", age))
            .or(youngest);
        let coppice = coppice_factor(sprouting, row.text("Regime").as_deref(), params);
        let vol7 = row.f64("Vol7");
        let regrowth = vol7.zip(coppice).map(|(v, c)| v * c);
        let replant = vol7.map(|v| v * (1.0 + params.genetic_gain_pct / 100.0));
        writer.push(
            row.rowid(),
            vec![
                Value::from(sprouting),
                Value::from(coppice),
                Value::from(regrowth),
                Value::from(replant),
            ],
        );
    }
    let n = writer.write(store, table)?;
    info!(table, rows = n, "coppice losses applied");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basal_spacing() {
        assert_eq!(basal_spacing(Some("3 X 2")), 6.0);
        assert_eq!(basal_spacing(Some("3,5 x 2,6")), 9.1);
        assert_eq!(basal_spacing(Some("Indefinido")), 9.0);
        assert_eq!(basal_spacing(Some("3 X 2 X 1")), 9.0);
        assert_eq!(basal_spacing(None), 9.0);
    }

    #[test]
    fn test_curve_factor_is_symmetric() {
        assert_eq!(curve_factor(130.0), 1.3);
        assert_eq!(curve_factor(80.0), 1.25);
        assert_eq!(curve_factor(100.0), 1.0);
    }

    #[test]
    fn test_volume_at_seven() {
        assert_eq!(volume_at_seven(Some(6.0), Some(300.0), 1.3), Some(390.0));
        let old = volume_at_seven(Some(9.0), Some(300.0), 1.25).unwrap();
        assert!((old - 225.0).abs() < 1e-9);
        assert_eq!(volume_at_seven(Some(9.0), Some(0.0), 1.3), Some(0.0));
        assert_eq!(volume_at_seven(None, None, 1.3), Some(0.0));
        assert_eq!(volume_at_seven(Some(5.0), None, 1.3), None);
    }

    #[test]
    fn test_coppice_factor_applies_second_rotation_only_to_reform_regime() {
        let params = ManagementParameters {
            genetic_loss_pct: 90.0,
            second_rotation_pct: 50.0,
            mechanized_harvest_pct: 100.0,
            ..Default::default()
        };
        let plain = coppice_factor(Some(80.0), Some("T"), &params).unwrap();
        let reform = coppice_factor(Some(80.0), Some("R"), &params).unwrap();
        assert!((plain - 0.72).abs() < 1e-12);
        assert!((reform - 0.36).abs() < 1e-12);
        assert_eq!(coppice_factor(None, Some("R"), &params), None);
    }
}
