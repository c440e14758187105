// ==========================================
// Talhão APEX - evaluation run record
// ==========================================
// Runs are numbered ordinally; the legacy table names are kept:
//   Apex_Manejo_<N>        result table
//   Manejo_Apex_t700_<N>   remnant lookup table
// ==========================================

use crate::domain::parameters::ManagementParameters;
use crate::domain::types::RunStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const RESULT_TABLE_PREFIX: &str = "Apex_Manejo_";
pub const REMNANT_TABLE_PREFIX: &str = "Manejo_Apex_t700_";

pub fn result_table_name(run_number: i64) -> String {
    format!("{}{}", RESULT_TABLE_PREFIX, run_number)
}

pub fn remnant_table_name(run_number: i64) -> String {
    format!("{}{}", REMNANT_TABLE_PREFIX, run_number)
}

/// Numeric suffix of a result table name (`Apex_Manejo_12` -> 12)
pub fn parse_run_suffix(table: &str) -> Option<i64> {
    let prefix_len = RESULT_TABLE_PREFIX.len();
    if table.len() <= prefix_len || !table[..prefix_len].eq_ignore_ascii_case(RESULT_TABLE_PREFIX) {
        return None;
    }
    table[prefix_len..].parse::<i64>().ok()
}

/// Next run number
///
/// Greater than the number of result tables, than any numeric suffix among
/// them, and than any registered run.
pub fn next_run_number(result_tables: &[String], max_registered: Option<i64>) -> i64 {
    let count = result_tables.len() as i64;
    let max_suffix = result_tables
        .iter()
        .filter_map(|t| parse_run_suffix(t))
        .max()
        .unwrap_or(0);
    count.max(max_suffix).max(max_registered.unwrap_or(0)) + 1
}

/// One row of ApexRunRegistry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_number: i64,
    pub run_id: String,
    pub result_table: String,
    pub remnant_table: Option<String>,
    pub remnant_reconciliation: bool,
    pub parameters: ManagementParameters,
    pub status: RunStatus,
    pub failed_stages: usize,
    pub created_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

impl RunRecord {
    /// A new RUNNING record with a fresh run id
    pub fn start(
        run_number: i64,
        remnant_reconciliation: bool,
        parameters: ManagementParameters,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            run_number,
            run_id: uuid::Uuid::new_v4().to_string(),
            result_table: result_table_name(run_number),
            remnant_table: remnant_reconciliation.then(|| remnant_table_name(run_number)),
            remnant_reconciliation,
            parameters,
            status: RunStatus::Running,
            failed_stages: 0,
            created_at: now,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(result_table_name(3), "Apex_Manejo_3");
        assert_eq!(remnant_table_name(3), "Manejo_Apex_t700_3");
        assert_eq!(parse_run_suffix("Apex_Manejo_12"), Some(12));
        assert_eq!(parse_run_suffix("apex_manejo_7"), Some(7));
        assert_eq!(parse_run_suffix("Apex_Manejo_old"), None);
        assert_eq!(parse_run_suffix("Apex_Manejo_"), None);
    }

    #[test]
    fn test_next_run_number_on_legacy_store() {
        let tables: Vec<String> = vec!["Apex_Manejo_1".into(), "Apex_Manejo_2".into()];
        assert_eq!(next_run_number(&tables, None), 3);
        assert_eq!(next_run_number(&[], None), 1);
    }

    #[test]
    fn test_next_run_number_skips_gaps_and_registry() {
        let tables: Vec<String> = vec!["Apex_Manejo_1".into(), "Apex_Manejo_5".into()];
        assert_eq!(next_run_number(&tables, None), 6);
        assert_eq!(next_run_number(&tables, Some(9)), 10);
    }

    #[test]
    fn test_start_record() {
        let now = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let r = RunRecord::start(4, true, ManagementParameters::default(), now);
        assert_eq!(r.status, RunStatus::Running);
        assert_eq!(r.remnant_table.as_deref(), Some("Manejo_Apex_t700_4"));
        assert_eq!(r.run_id.len(), 36);
        let r = RunRecord::start(4, false, ManagementParameters::default(), now);
        assert!(r.remnant_table.is_none());
    }
}
