// ==========================================
// Talhão APEX - application state
// ==========================================
// Shared API instances over one store file. The pipeline runner is
// shared so consist and manejo runs replace one another.
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ConsistencyApi, ImportApi, ManejoApi};
use crate::config::{ConfigManager, PipelineConfigReader};
use crate::engine::runner::PipelineRunner;
use crate::store::TabularStore;

pub struct AppState {
    pub db_path: String,
    pub store: TabularStore,
    pub config_manager: Arc<ConfigManager>,
    pub runner: Arc<PipelineRunner>,
    pub import_api: Arc<ImportApi>,
    pub consistency_api: Arc<ConsistencyApi>,
    pub manejo_api: Arc<ManejoApi>,
}

impl AppState {
    /// Open the store and wire every API
    ///
    /// The stage failure policy, the remnant default and the locale are
    /// read from config_kv once, here.
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "initializing application state");

        let store = TabularStore::new(&db_path);
        let config_manager = Arc::new(
            ConfigManager::new(&db_path).map_err(|e| format!("cannot open configuration: {}", e))?,
        );

        match config_manager.get_locale().await {
            Ok(locale) => crate::i18n::set_locale(&locale),
            Err(e) => tracing::warn!(error = %e, "locale not configured, keeping default"),
        }

        let runner = Arc::new(
            PipelineRunner::from_config(store.clone(), config_manager.as_ref())
                .await
                .map_err(|e| format!("cannot configure pipeline runner: {}", e))?,
        );

        let manejo_api = Arc::new(
            ManejoApi::new(store.clone(), runner.clone())
                .map_err(|e| format!("cannot open run registry: {}", e))?,
        );

        Ok(Self {
            import_api: Arc::new(ImportApi::new(store.clone())),
            consistency_api: Arc::new(ConsistencyApi::new(store.clone())),
            manejo_api,
            runner,
            config_manager,
            store,
            db_path,
        })
    }
}

/// Store file path
///
/// `TALHAO_APEX_DB_PATH` when set, otherwise
/// `<data dir>/talhao-apex/talhao_apex.db`, otherwise `./talhao_apex.db`.
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("TALHAO_APEX_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./talhao_apex.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("talhao-apex");
        // best-effort: an unwritable data dir falls back to SQLite's own error on open
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot create data directory");
        }
        path = dir.join("talhao_apex.db");
    }
    path.to_string_lossy().to_string()
}
