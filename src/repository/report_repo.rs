// ==========================================
// Talhão APEX - regional summaries of a run table
// ==========================================
// Totals per final management label and region code, where the code is
// a two-character slice of the stand code:
//   positions 1-2 region group, 3-4 region, 5-6 sub-region
// Sums and means are rounded to whole units; an empty mean is 0.
// ==========================================

use crate::domain::stand_code::{REGION, REGION_GROUP, SUB_REGION};
use crate::domain::types::ManagementLabel;
use crate::repository::error::RepositoryResult;
use crate::store::expr::sqlite_substr;
use crate::store::TabularStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FINAL_LABEL_COLUMN: &str = "ManejoAPEX_Final";

/// Which slice of the stand code identifies the region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionLevel {
    RegionGroup,
    Region,
    SubRegion,
}

impl RegionLevel {
    fn slice(&self) -> (i64, i64) {
        match self {
            RegionLevel::RegionGroup => REGION_GROUP,
            RegionLevel::Region => REGION,
            RegionLevel::SubRegion => SUB_REGION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Sum,
    Mean,
}

/// One cell of a regional summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalTotal {
    pub label: String,
    pub code: String,
    pub value: f64,
}

pub struct RegionalReportRepository {
    store: TabularStore,
}

impl RegionalReportRepository {
    pub fn new(store: TabularStore) -> Self {
        Self { store }
    }

    /// `column` per (final label, region code), ordered by label then code
    pub fn by_region(
        &self,
        run_table: &str,
        level: RegionLevel,
        column: &str,
        statistic: Statistic,
    ) -> RepositoryResult<Vec<RegionalTotal>> {
        let table = self
            .store
            .read_columns(run_table, &["Talhao", FINAL_LABEL_COLUMN, column])?;
        let (start, len) = level.slice();

        let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for row in table.iter() {
            let (Some(code), Some(label)) = (row.text("Talhao"), row.text(FINAL_LABEL_COLUMN))
            else {
                continue;
            };
            let entry = groups
                .entry((label, sqlite_substr(&code, start, Some(len))))
                .or_default();
            if let Some(v) = row.f64(column) {
                entry.push(v);
            }
        }

        Ok(groups
            .into_iter()
            .map(|((label, code), values)| RegionalTotal {
                label,
                code,
                value: summarize(&values, statistic),
            })
            .collect())
    }

    /// Total `Area` per final label (both labels always present)
    pub fn area_by_label(&self, run_table: &str) -> RepositoryResult<Vec<(ManagementLabel, f64)>> {
        let table = self
            .store
            .read_columns(run_table, &[FINAL_LABEL_COLUMN, "Area"])?;
        Ok([ManagementLabel::Reforma, ManagementLabel::Regeneracao]
            .into_iter()
            .map(|label| {
                let areas: Vec<f64> = table
                    .iter()
                    .filter(|r| r.text(FINAL_LABEL_COLUMN).as_deref() == Some(label.as_str()))
                    .filter_map(|r| r.f64("Area"))
                    .collect();
                (label, summarize(&areas, Statistic::Sum))
            })
            .collect())
    }
}

fn summarize(values: &[f64], statistic: Statistic) -> f64 {
    let sum: f64 = values.iter().sum();
    match statistic {
        Statistic::Sum => sum.round(),
        Statistic::Mean if values.is_empty() => 0.0,
        Statistic::Mean => (sum / values.len() as f64).round(),
    }
}
