// ==========================================
// Talhão APEX - configuration
// ==========================================
// Storage: config_kv table (scope 'global')
// ==========================================

pub mod config_manager;
pub mod pipeline_config_trait;

pub use config_manager::{config_keys, ConfigManager, ConfigResult};
pub use pipeline_config_trait::PipelineConfigReader;
