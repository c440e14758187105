// ==========================================
// Talhão APEX - configuration manager
// ==========================================
// Storage: config_kv (key/value, scope 'global')
// Loads, reads with defaults, overrides and snapshots settings
// ==========================================

use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::db::{ensure_app_schema, open_sqlite_connection};
use crate::engine::stage::StageFailurePolicy;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        ensure_app_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Wrap an existing connection
    ///
    /// The shared PRAGMAs and the config tables are applied again (idempotent).
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| format!("lock failed: {}", e))?;
            crate::db::configure_sqlite_connection(&guard)?;
            ensure_app_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// Read a global value
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Insert or override a global value
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// Every global value as a JSON object
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// Restore global values from a snapshot; returns the number written
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;
        let mut conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in &config_map {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(count)
    }

    fn get_bool(&self, key: &str, default: bool) -> ConfigResult<bool> {
        let value = self.get_config_or_default(key, if default { "true" } else { "false" })?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "sim" => Ok(true),
            "false" | "0" | "no" | "nao" | "não" => Ok(false),
            other => {
                warn!(key, value = other, default, "invalid boolean setting, using default");
                Ok(default)
            }
        }
    }
}

// ==========================================
// PipelineConfigReader implementation
// ==========================================
#[async_trait]
impl PipelineConfigReader for ConfigManager {
    async fn get_stage_failure_policy(&self) -> ConfigResult<StageFailurePolicy> {
        let value = self.get_config_or_default(
            config_keys::STAGE_FAILURE_POLICY,
            StageFailurePolicy::default().as_str(),
        )?;
        Ok(StageFailurePolicy::parse(&value).unwrap_or_else(|| {
            warn!(value = %value, "unknown stage failure policy, continuing on error");
            StageFailurePolicy::default()
        }))
    }

    async fn get_remnant_reconciliation(&self) -> ConfigResult<bool> {
        self.get_bool(config_keys::REMNANT_RECONCILIATION, false)
    }

    async fn get_locale(&self) -> ConfigResult<String> {
        self.get_config_or_default(config_keys::LOCALE, crate::i18n::DEFAULT_LOCALE)
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    /// continue | abort
    pub const STAGE_FAILURE_POLICY: &str = "pipeline.stage_failure_policy";
    /// Default for runs that do not say whether to reconcile remnants
    pub const REMNANT_RECONCILIATION: &str = "pipeline.remnant_reconciliation";
    pub const LOCALE: &str = "ui.locale";
}
