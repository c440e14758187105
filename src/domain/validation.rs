// ==========================================
// Talhão APEX - ledger validation conditions
// ==========================================
// Ten named data-quality conditions checked against apex_base_1,
// in fixed order. Rows are never rejected; matching rows are offered
// to the operator for correction.
// ==========================================

use crate::store::table::RowRef;
use crate::store::value::Value;
use serde::{Deserialize, Serialize};

/// Columns of the adjustment view, primary key first
pub const ADJUSTMENT_COLUMNS: [&str; 14] = [
    "id",
    "Talhao",
    "Area",
    "DCR_MatGen",
    "ESP",
    "VTCC",
    "DT_Plantio",
    "DT_Medicao",
    "Idade",
    "DIST_LP",
    "DIST_PFRod",
    "DIST_PFFer",
    "DIST_LFRod",
    "DIST_Total",
];

pub const VOLUME_LOW_MAX: f64 = 100.0;
pub const VOLUME_HIGH_MIN: f64 = 600.0;
pub const UNDEFINED_SPECIES: &str = "Indefinido";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentCondition {
    MaterialMissing,
    DistanceMissing,
    SpeciesMissing,
    SpeciesUndefined,
    AgeMissing,
    AgeNegative,
    AreaMissing,
    VolumeMissing,
    VolumeLow,
    VolumeHigh,
}

impl AdjustmentCondition {
    pub const ALL: [AdjustmentCondition; 10] = [
        AdjustmentCondition::MaterialMissing,
        AdjustmentCondition::DistanceMissing,
        AdjustmentCondition::SpeciesMissing,
        AdjustmentCondition::SpeciesUndefined,
        AdjustmentCondition::AgeMissing,
        AdjustmentCondition::AgeNegative,
        AdjustmentCondition::AreaMissing,
        AdjustmentCondition::VolumeMissing,
        AdjustmentCondition::VolumeLow,
        AdjustmentCondition::VolumeHigh,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AdjustmentCondition::MaterialMissing => "material_missing",
            AdjustmentCondition::DistanceMissing => "distance_missing",
            AdjustmentCondition::SpeciesMissing => "species_missing",
            AdjustmentCondition::SpeciesUndefined => "species_undefined",
            AdjustmentCondition::AgeMissing => "age_missing",
            AdjustmentCondition::AgeNegative => "age_negative",
            AdjustmentCondition::AreaMissing => "area_missing",
            AdjustmentCondition::VolumeMissing => "volume_missing",
            AdjustmentCondition::VolumeLow => "volume_low",
            AdjustmentCondition::VolumeHigh => "volume_high",
        }
    }

    /// Operator-facing label in the current locale
    pub fn label(&self) -> String {
        crate::i18n::t(&format!("validation.{}", self.key()))
    }

    /// Whether a ledger row meets this condition
    pub fn matches(&self, row: &RowRef<'_>) -> bool {
        match self {
            AdjustmentCondition::MaterialMissing => row.get("DCR_MatGen").is_placeholder(),
            AdjustmentCondition::DistanceMissing => row.get("DIST_Total").is_placeholder(),
            AdjustmentCondition::SpeciesMissing => match row.get("ESP") {
                Value::Null => true,
                v => v.as_text().map(|s| s.trim() == "None").unwrap_or(false),
            },
            AdjustmentCondition::SpeciesUndefined => {
                row.text("ESP").map(|s| s.trim() == UNDEFINED_SPECIES).unwrap_or(false)
            }
            AdjustmentCondition::AgeMissing => match row.get("Idade") {
                Value::Null => true,
                v => v.as_f64() == Some(0.0),
            },
            AdjustmentCondition::AgeNegative => row.f64("Idade").map(|a| a < 0.0).unwrap_or(false),
            AdjustmentCondition::AreaMissing => row.get("Area").is_placeholder(),
            AdjustmentCondition::VolumeMissing => row.get("VTCC").is_placeholder(),
            AdjustmentCondition::VolumeLow => {
                row.f64("VTCC").map(|v| v <= VOLUME_LOW_MAX).unwrap_or(false)
            }
            AdjustmentCondition::VolumeHigh => {
                row.f64("VTCC").map(|v| v >= VOLUME_HIGH_MIN).unwrap_or(false)
            }
        }
    }
}

/// Count of one condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionCount {
    pub condition: AdjustmentCondition,
    pub label: String,
    pub count: usize,
}

/// Validation result over the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub total_rows: usize,
    pub counts: Vec<ConditionCount>,
    pub columns: Vec<String>,
    /// Rows matching any condition, in ledger order
    pub rows: Vec<Vec<Value>>,
}

impl AdjustmentReport {
    pub fn count_of(&self, condition: AdjustmentCondition) -> usize {
        self.counts
            .iter()
            .find(|c| c.condition == condition)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids of the adjustment rows
    pub fn ids(&self) -> Vec<i64> {
        self.rows
            .iter()
            .filter_map(|r| r.first().and_then(Value::as_i64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::table::{ColumnDef, Row, Table};

    fn ledger(rows: Vec<Vec<Value>>) -> Table {
        let mut t = Table::new(
            "apex_base_1",
            vec![
                ColumnDef::text("DCR_MatGen"),
                ColumnDef::real("DIST_Total"),
                ColumnDef::text("ESP"),
                ColumnDef::real("Idade"),
                ColumnDef::real("Area"),
                ColumnDef::real("VTCC"),
            ],
        );
        for (i, values) in rows.into_iter().enumerate() {
            t.rows.push(Row { rowid: i as i64 + 1, values });
        }
        t
    }

    fn hits(t: &Table, idx: usize) -> Vec<&'static str> {
        let row = t.row(idx).unwrap();
        AdjustmentCondition::ALL
            .iter()
            .filter(|c| c.matches(&row))
            .map(|c| c.key())
            .collect()
    }

    #[test]
    fn test_clean_row_matches_nothing() {
        let t = ledger(vec![vec![
            Value::from("CL-144"),
            Value::Real(80.0),
            Value::from("3 x 2"),
            Value::Real(6.0),
            Value::Real(10.0),
            Value::Real(250.0),
        ]]);
        assert!(hits(&t, 0).is_empty());
    }

    #[test]
    fn test_placeholders_and_bounds() {
        let t = ledger(vec![vec![
            Value::from("None"),
            Value::Real(0.0),
            Value::Null,
            Value::Real(-1.0),
            Value::Null,
            Value::Real(600.0),
        ]]);
        assert_eq!(
            hits(&t, 0),
            vec![
                "material_missing",
                "distance_missing",
                "species_missing",
                "age_negative",
                "area_missing",
                "volume_high"
            ]
        );
    }

    #[test]
    fn test_low_volume_and_undefined_species() {
        let t = ledger(vec![vec![
            Value::from("CL-144"),
            Value::Real(50.0),
            Value::from("Indefinido"),
            Value::Real(0.0),
            Value::Real(3.0),
            Value::Real(100.0),
        ]]);
        assert_eq!(hits(&t, 0), vec!["species_undefined", "age_missing", "volume_low"]);
    }
}
