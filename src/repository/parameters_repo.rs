// ==========================================
// Talhão APEX - management parameters repository
// ==========================================
// `Parametros` is append-only: the last row is the active parameter set.
// `ParametrosHistorico` receives a copy of that row at the end of each run.
// ==========================================

use crate::domain::parameters::ManagementParameters;
use crate::repository::error::RepositoryResult;
use crate::store::{ColumnDef, TabularStore};
use tracing::{info, warn};

pub const PARAMETERS_TABLE: &str = "Parametros";
pub const PARAMETERS_HISTORY_TABLE: &str = "ParametrosHistorico";

pub struct ParametersRepository {
    store: TabularStore,
}

impl ParametersRepository {
    pub fn new(store: TabularStore) -> Self {
        Self { store }
    }

    /// The last `Parametros` row, or defaults when the table is absent or empty
    pub fn latest(&self) -> RepositoryResult<ManagementParameters> {
        if !self.store.table_exists(PARAMETERS_TABLE)? {
            warn!(table = PARAMETERS_TABLE, "parameters table missing, using defaults");
            return Ok(ManagementParameters::default());
        }
        let table = self.store.read_table(PARAMETERS_TABLE)?;
        match table.len().checked_sub(1).and_then(|i| table.row(i)) {
            Some(row) => Ok(ManagementParameters::from_row(&row)),
            None => {
                warn!(table = PARAMETERS_TABLE, "parameters table empty, using defaults");
                Ok(ManagementParameters::default())
            }
        }
    }

    /// Append a parameter set; it becomes the active one
    pub fn append(&self, params: &ManagementParameters) -> RepositoryResult<()> {
        let defs = ManagementParameters::column_defs();
        if !self.store.table_exists(PARAMETERS_TABLE)? {
            self.store.create_table(PARAMETERS_TABLE, &defs, true)?;
        }
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        self.store
            .insert_rows(PARAMETERS_TABLE, &names, &[params.row_values()])?;
        info!(interest_pct = params.interest_pct, "parameters appended");
        Ok(())
    }

    /// Positions and definitions of the `Parametros` columns, primary key excluded
    fn history_columns(&self, columns: &[ColumnDef]) -> RepositoryResult<(Vec<usize>, Vec<ColumnDef>)> {
        let pk = self.store.integer_primary_key(PARAMETERS_TABLE)?;
        Ok(columns
            .iter()
            .enumerate()
            .filter(|(_, c)| pk.as_deref().map_or(true, |k| !c.name.eq_ignore_ascii_case(k)))
            .map(|(i, c)| (i, c.clone()))
            .unzip())
    }

    /// Create `ParametrosHistorico` with the `Parametros` schema if absent
    ///
    /// Returns whether the table was created.
    pub fn ensure_history_table(&self) -> RepositoryResult<bool> {
        if self.store.table_exists(PARAMETERS_HISTORY_TABLE)? {
            return Ok(false);
        }
        let defs = if self.store.table_exists(PARAMETERS_TABLE)? {
            let columns = self.store.columns(PARAMETERS_TABLE)?;
            self.history_columns(&columns)?.1
        } else {
            ManagementParameters::column_defs()
        };
        self.store.create_table(PARAMETERS_HISTORY_TABLE, &defs, true)?;
        info!(table = PARAMETERS_HISTORY_TABLE, "history table created");
        Ok(true)
    }

    /// Copy the last `Parametros` row into `ParametrosHistorico`
    ///
    /// Returns the number of rows copied (0 when there is nothing to copy).
    pub fn snapshot_to_history(&self) -> RepositoryResult<usize> {
        if !self.store.table_exists(PARAMETERS_TABLE)? {
            warn!(table = PARAMETERS_TABLE, "no parameters to snapshot");
            return Ok(0);
        }
        self.ensure_history_table()?;
        let source = self.store.read_table(PARAMETERS_TABLE)?;
        let Some(last) = source.rows.last() else {
            return Ok(0);
        };

        let (keep, defs) = self.history_columns(&source.columns)?;
        let names: Vec<&str> = defs.iter().map(|c| c.name.as_str()).collect();
        let values = keep.iter().map(|&i| last.values[i].clone()).collect();
        let copied = self
            .store
            .insert_rows(PARAMETERS_HISTORY_TABLE, &names, &[values])?;
        info!(table = PARAMETERS_HISTORY_TABLE, "parameters snapshot saved");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_latest_defaults_when_missing() {
        let f = NamedTempFile::new().unwrap();
        let repo = ParametersRepository::new(TabularStore::new(f.path().to_str().unwrap()));
        assert_eq!(repo.latest().unwrap(), ManagementParameters::default());
        assert_eq!(repo.snapshot_to_history().unwrap(), 0);
    }

    #[test]
    fn test_append_latest_and_snapshot() {
        let f = NamedTempFile::new().unwrap();
        let store = TabularStore::new(f.path().to_str().unwrap());
        let repo = ParametersRepository::new(store.clone());

        let mut first = ManagementParameters::default();
        first.interest_pct = 6.0;
        let mut second = first.clone();
        second.interest_pct = 9.0;
        repo.append(&first).unwrap();
        repo.append(&second).unwrap();
        assert_eq!(repo.latest().unwrap(), second);

        assert_eq!(repo.snapshot_to_history().unwrap(), 1);
        assert_eq!(repo.snapshot_to_history().unwrap(), 1);
        let history = store.read_table(PARAMETERS_HISTORY_TABLE).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.row(1).unwrap().f64("Juros"), Some(9.0));
    }
}
