// ==========================================
// Talhão APEX - consistency API
// ==========================================
// Correction surface over apex_base_1: read the adjustment grid,
// save edited rows, delete rows. Every write returns the fresh
// validation counts.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::validation::{AdjustmentReport, ADJUSTMENT_COLUMNS};
use crate::engine::consist::{ConsistencyEngine, APEX_BASE_1};
use crate::store::{TabularStore, Value};
use tracing::info;

pub struct ConsistencyApi {
    engine: ConsistencyEngine,
}

impl ConsistencyApi {
    pub fn new(store: TabularStore) -> Self {
        Self {
            engine: ConsistencyEngine::new(store),
        }
    }

    /// Current validation counts
    pub fn validation_report(&self) -> ApiResult<AdjustmentReport> {
        Ok(self.engine.validate()?)
    }

    /// Adjustment columns of every ledger row as display strings
    ///
    /// NULL cells come back empty, the same form `save_corrections` reads.
    pub fn adjustment_rows(&self) -> ApiResult<Vec<Vec<String>>> {
        let table = self.engine.store().read_columns(APEX_BASE_1, &ADJUSTMENT_COLUMNS)?;
        Ok(table
            .iter()
            .map(|row| {
                row.values()
                    .iter()
                    .map(|v| match v {
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect())
    }

    pub fn save_corrections(&self, rows: Vec<Vec<String>>) -> ApiResult<AdjustmentReport> {
        if rows.is_empty() {
            return Err(ApiError::InvalidInput("no corrections to save".to_string()));
        }
        info!(rows = rows.len(), "saving corrections");
        Ok(self.engine.save_corrections(&rows)?)
    }

    pub fn delete_rows(&self, ids: Vec<i64>) -> ApiResult<AdjustmentReport> {
        if ids.is_empty() {
            return Err(ApiError::InvalidInput("no rows selected".to_string()));
        }
        info!(rows = ids.len(), "deleting ledger rows");
        Ok(self.engine.delete_rows(&ids)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_rejects_empty_requests() {
        let f = NamedTempFile::new().unwrap();
        let api = ConsistencyApi::new(TabularStore::new(f.path().to_str().unwrap()));
        assert!(matches!(api.save_corrections(vec![]), Err(ApiError::InvalidInput(_))));
        assert!(matches!(api.delete_rows(vec![]), Err(ApiError::InvalidInput(_))));
        assert!(matches!(api.adjustment_rows(), Err(ApiError::NotFound(_))));
    }
}
