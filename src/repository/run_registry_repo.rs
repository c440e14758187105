// ==========================================
// Talhão APEX - run registry repository
// ==========================================
// One row per evaluation run in ApexRunRegistry. Runs are append-only:
// a row is inserted as RUNNING and completed once, never deleted.
// ==========================================

use crate::db::{ensure_app_schema, open_sqlite_connection};
use crate::domain::parameters::ManagementParameters;
use crate::domain::run::RunRecord;
use crate::domain::types::RunStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SELECT_COLUMNS: &str = r#"
    run_number, run_id, result_table, remnant_table, remnant_reconciliation,
    parameters_json, status, failed_stages, created_at, finished_at
"#;

pub struct RunRegistryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RunRegistryRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_app_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            ensure_app_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Largest registered run number
    pub fn max_run_number(&self) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(run_number) FROM ApexRunRegistry", [], |row| row.get(0))?;
        Ok(max)
    }

    /// Register a run (status RUNNING)
    pub fn insert(&self, record: &RunRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO ApexRunRegistry (
                run_number, run_id, result_table, remnant_table, remnant_reconciliation,
                parameters_json, status, failed_stages, created_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.run_number,
                record.run_id,
                record.result_table,
                record.remnant_table,
                record.remnant_reconciliation,
                serde_json::to_string(&record.parameters)?,
                record.status.as_str(),
                record.failed_stages as i64,
                record.created_at.format(DATETIME_FORMAT).to_string(),
                record
                    .finished_at
                    .map(|t| t.format(DATETIME_FORMAT).to_string()),
            ],
        )?;
        Ok(())
    }

    /// Record the final status of a run
    pub fn complete(
        &self,
        run_number: i64,
        status: RunStatus,
        failed_stages: usize,
        finished_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"
            UPDATE ApexRunRegistry
            SET status = ?1, failed_stages = ?2, finished_at = ?3
            WHERE run_number = ?4
            "#,
            params![
                status.as_str(),
                failed_stages as i64,
                finished_at.format(DATETIME_FORMAT).to_string(),
                run_number,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ApexRunRegistry".to_string(),
                id: run_number.to_string(),
            });
        }
        Ok(())
    }

    pub fn find(&self, run_number: i64) -> RepositoryResult<Option<RunRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM ApexRunRegistry WHERE run_number = ?1",
            SELECT_COLUMNS
        );
        let raw = conn
            .query_row(&sql, [run_number], RawRunRow::from_row)
            .optional()?;
        raw.map(RawRunRow::into_record).transpose()
    }

    /// All runs, newest first
    pub fn list(&self) -> RepositoryResult<Vec<RunRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM ApexRunRegistry ORDER BY run_number DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map([], RawRunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRunRow::into_record).collect()
    }
}

/// Registry row as stored, before parsing
struct RawRunRow {
    run_number: i64,
    run_id: String,
    result_table: String,
    remnant_table: Option<String>,
    remnant_reconciliation: bool,
    parameters_json: String,
    status: String,
    failed_stages: i64,
    created_at: String,
    finished_at: Option<String>,
}

impl RawRunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_number: row.get(0)?,
            run_id: row.get(1)?,
            result_table: row.get(2)?,
            remnant_table: row.get(3)?,
            remnant_reconciliation: row.get(4)?,
            parameters_json: row.get(5)?,
            status: row.get(6)?,
            failed_stages: row.get(7)?,
            created_at: row.get(8)?,
            finished_at: row.get(9)?,
        })
    }

    fn into_record(self) -> RepositoryResult<RunRecord> {
        let parse_time = |field: &str, s: &str| {
            NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|e| {
                RepositoryError::FieldValueError {
                    field: field.to_string(),
                    message: e.to_string(),
                }
            })
        };
        let status = RunStatus::from_str(&self.status).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "status".to_string(),
                message: self.status.clone(),
            }
        })?;
        let parameters: ManagementParameters = serde_json::from_str(&self.parameters_json)?;

        Ok(RunRecord {
            run_number: self.run_number,
            run_id: self.run_id,
            result_table: self.result_table,
            remnant_table: self.remnant_table,
            remnant_reconciliation: self.remnant_reconciliation,
            parameters,
            status,
            failed_stages: self.failed_stages.max(0) as usize,
            created_at: parse_time("created_at", &self.created_at)?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(|s| parse_time("finished_at", s))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_insert_complete_and_find() {
        let f = NamedTempFile::new().unwrap();
        let repo = RunRegistryRepository::new(f.path().to_str().unwrap()).unwrap();
        assert_eq!(repo.max_run_number().unwrap(), None);

        let mut params = ManagementParameters::default();
        params.interest_pct = 6.5;
        let record = RunRecord::start(3, true, params.clone(), at(8));
        repo.insert(&record).unwrap();
        repo.complete(3, RunStatus::CompletedWithErrors, 2, at(9))
            .unwrap();

        let found = repo.find(3).unwrap().unwrap();
        assert_eq!(found.run_id, record.run_id);
        assert_eq!(found.status, RunStatus::CompletedWithErrors);
        assert_eq!(found.failed_stages, 2);
        assert_eq!(found.parameters, params);
        assert_eq!(found.finished_at, Some(at(9)));
        assert_eq!(found.remnant_table.as_deref(), Some("Manejo_Apex_t700_3"));
        assert_eq!(repo.max_run_number().unwrap(), Some(3));
    }

    #[test]
    fn test_run_numbers_are_unique() {
        let f = NamedTempFile::new().unwrap();
        let repo = RunRegistryRepository::new(f.path().to_str().unwrap()).unwrap();
        let params = ManagementParameters::default();
        repo.insert(&RunRecord::start(1, false, params.clone(), at(8)))
            .unwrap();
        let dup = repo.insert(&RunRecord::start(1, false, params, at(9)));
        assert!(matches!(
            dup,
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));
    }

    #[test]
    fn test_complete_unknown_run() {
        let f = NamedTempFile::new().unwrap();
        let repo = RunRegistryRepository::new(f.path().to_str().unwrap()).unwrap();
        let err = repo.complete(42, RunStatus::Completed, 0, at(8));
        assert!(matches!(err, Err(RepositoryError::NotFound { .. })));
    }
}
