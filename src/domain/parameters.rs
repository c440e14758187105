// ==========================================
// Talhão APEX - management parameters
// ==========================================
// Named view over the `Parametros` row used by an evaluation run.
// Columns are read by name; legacy stores that only agree on column
// order fall back to the historical positions (id at 0).
// All values are percentages as stored.
// ==========================================

use crate::domain::types::ElevationClass;
use crate::store::table::{ColumnDef, RowRef};
use crate::store::value::Value;
use serde::{Deserialize, Serialize};

/// Basal spacing (m²) separating the two minimum-stem thresholds
pub const WIDE_SPACING_M2: f64 = 9.0;

/// (column name, legacy position)
pub const PARAMETER_COLUMNS: [(&str, usize); 13] = [
    ("GanhoGenetico", 1),
    ("PerdaGenetica", 2),
    ("R2", 3),
    ("TalhadiaRA", 4),
    ("TalhadiaRB", 5),
    ("RA3", 6),
    ("RB3", 7),
    ("RA2", 8),
    ("RB2", 9),
    ("AcrescimoColheitaTalhadia", 10),
    ("Juros", 11),
    ("AvaliacaoEco", 12),
    ("MecColheita", 13),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementParameters {
    /// GanhoGenetico: first-rotation volume gain
    pub genetic_gain_pct: f64,
    /// PerdaGenetica: regrowth volume retained
    pub genetic_loss_pct: f64,
    /// R2: extra regrowth factor for reform-origin stands
    pub second_rotation_pct: f64,
    /// TalhadiaRA: delivered-cost discount outside low regions
    pub coppice_rate_high_pct: f64,
    /// TalhadiaRB: delivered-cost discount in low regions
    pub coppice_rate_low_pct: f64,
    /// RA3
    pub min_stems_high_wide: f64,
    /// RB3
    pub min_stems_low_wide: f64,
    /// RA2
    pub min_stems_high_narrow: f64,
    /// RB2
    pub min_stems_low_narrow: f64,
    /// AcrescimoColheitaTalhadia
    pub coppice_harvest_surcharge_pct: f64,
    /// Juros: annual interest rate
    pub interest_pct: f64,
    /// AvaliacaoEco: viability threshold for the cost ratio
    pub viability_threshold_pct: f64,
    /// MecColheita: mechanized harvest efficiency
    pub mechanized_harvest_pct: f64,
}

impl Default for ManagementParameters {
    fn default() -> Self {
        Self {
            genetic_gain_pct: 0.0,
            genetic_loss_pct: 100.0,
            second_rotation_pct: 100.0,
            coppice_rate_high_pct: 0.0,
            coppice_rate_low_pct: 0.0,
            min_stems_high_wide: 0.0,
            min_stems_low_wide: 0.0,
            min_stems_high_narrow: 0.0,
            min_stems_low_narrow: 0.0,
            coppice_harvest_surcharge_pct: 0.0,
            interest_pct: 8.0,
            viability_threshold_pct: 100.0,
            mechanized_harvest_pct: 100.0,
        }
    }
}

impl ManagementParameters {
    /// Read from a `Parametros` row
    ///
    /// Missing or non-numeric cells keep their default.
    pub fn from_row(row: &RowRef<'_>) -> Self {
        let mut values = Self::default().to_values();
        for (slot, (name, position)) in values.iter_mut().zip(PARAMETER_COLUMNS) {
            let cell = match row.get(name) {
                Value::Null => row.values().get(position).cloned().unwrap_or(Value::Null),
                v => v.clone(),
            };
            if let Some(x) = cell.as_f64() {
                *slot = x;
            }
        }
        Self::from_values(&values)
    }

    fn to_values(&self) -> [f64; 13] {
        [
            self.genetic_gain_pct,
            self.genetic_loss_pct,
            self.second_rotation_pct,
            self.coppice_rate_high_pct,
            self.coppice_rate_low_pct,
            self.min_stems_high_wide,
            self.min_stems_low_wide,
            self.min_stems_high_narrow,
            self.min_stems_low_narrow,
            self.coppice_harvest_surcharge_pct,
            self.interest_pct,
            self.viability_threshold_pct,
            self.mechanized_harvest_pct,
        ]
    }

    fn from_values(v: &[f64; 13]) -> Self {
        Self {
            genetic_gain_pct: v[0],
            genetic_loss_pct: v[1],
            second_rotation_pct: v[2],
            coppice_rate_high_pct: v[3],
            coppice_rate_low_pct: v[4],
            min_stems_high_wide: v[5],
            min_stems_low_wide: v[6],
            min_stems_high_narrow: v[7],
            min_stems_low_narrow: v[8],
            coppice_harvest_surcharge_pct: v[9],
            interest_pct: v[10],
            viability_threshold_pct: v[11],
            mechanized_harvest_pct: v[12],
        }
    }

    /// Column definitions of a `Parametros` table
    pub fn column_defs() -> Vec<ColumnDef> {
        PARAMETER_COLUMNS
            .iter()
            .map(|(name, _)| ColumnDef::real(*name))
            .collect()
    }

    /// Row values in `column_defs` order
    pub fn row_values(&self) -> Vec<Value> {
        self.to_values().iter().map(|v| Value::Real(*v)).collect()
    }

    /// Annual discount rate as a fraction
    pub fn interest_rate(&self) -> f64 {
        self.interest_pct / 100.0
    }

    /// Present-value factor for a year: 1 / (1 + juros)^year
    pub fn discount_factor(&self, year: f64) -> f64 {
        1.0 / (1.0 + self.interest_rate()).powf(year)
    }

    /// `fave`
    pub fn viability_threshold(&self) -> f64 {
        self.viability_threshold_pct / 100.0
    }

    /// Minimum stem count for an elevation class and basal spacing (ArvMin)
    pub fn min_stems(&self, elevation: ElevationClass, basal_spacing: f64) -> f64 {
        let wide = basal_spacing >= WIDE_SPACING_M2;
        match (elevation, wide) {
            (ElevationClass::High, false) => self.min_stems_high_narrow,
            (ElevationClass::Low, false) => self.min_stems_low_narrow,
            (ElevationClass::High, true) => self.min_stems_high_wide,
            (ElevationClass::Low, true) => self.min_stems_low_wide,
        }
    }

    /// Delivered-cost discount for an elevation class (TalhadiaRA/RB)
    pub fn coppice_rate_pct(&self, elevation: ElevationClass) -> f64 {
        match elevation {
            ElevationClass::High => self.coppice_rate_high_pct,
            ElevationClass::Low => self.coppice_rate_low_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::table::{Row, Table};

    #[test]
    fn test_defaults_mean_no_losses() {
        let p = ManagementParameters::default();
        assert_eq!(p.interest_rate(), 0.08);
        assert_eq!(p.genetic_loss_pct, 100.0);
        assert_eq!(p.viability_threshold(), 1.0);
        assert!((p.discount_factor(7.0) - 1.0 / 1.08f64.powi(7)).abs() < 1e-12);
    }

    #[test]
    fn test_reads_by_name() {
        let mut defs = vec![ColumnDef::integer("id")];
        defs.extend(ManagementParameters::column_defs());
        let mut t = Table::new("Parametros", defs);
        let mut p = ManagementParameters::default();
        p.interest_pct = 10.0;
        p.min_stems_low_wide = 900.0;
        let mut values = vec![Value::Integer(1)];
        values.extend(p.row_values());
        t.rows.push(Row { rowid: 1, values });

        assert_eq!(ManagementParameters::from_row(&t.row(0).unwrap()), p);
    }

    #[test]
    fn test_positional_fallback() {
        let mut defs = vec![ColumnDef::integer("id")];
        defs.extend((1..=13).map(|i| ColumnDef::real(format!("p{}", i))));
        let mut t = Table::new("Parametros", defs);
        let mut values = vec![Value::Integer(1)];
        values.extend((1..=13).map(|i| Value::Real(i as f64)));
        t.rows.push(Row { rowid: 1, values });

        let p = ManagementParameters::from_row(&t.row(0).unwrap());
        assert_eq!(p.genetic_gain_pct, 1.0);
        assert_eq!(p.interest_pct, 11.0);
        assert_eq!(p.mechanized_harvest_pct, 13.0);
    }

    #[test]
    fn test_min_stems_matrix() {
        let p = ManagementParameters {
            min_stems_high_wide: 3.0,
            min_stems_low_wide: 4.0,
            min_stems_high_narrow: 1.0,
            min_stems_low_narrow: 2.0,
            ..Default::default()
        };
        assert_eq!(p.min_stems(ElevationClass::High, 8.9), 1.0);
        assert_eq!(p.min_stems(ElevationClass::Low, 6.0), 2.0);
        assert_eq!(p.min_stems(ElevationClass::High, 9.0), 3.0);
        assert_eq!(p.min_stems(ElevationClass::Low, 12.0), 4.0);
    }
}
