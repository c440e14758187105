// ==========================================
// Talhão APEX - pipeline configuration reader
// ==========================================
// Read-side interface the runner needs from configuration.
// No writes, no evaluation rules.
// ==========================================

use crate::config::config_manager::ConfigResult;
use crate::engine::stage::StageFailurePolicy;
use async_trait::async_trait;

#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    /// What a failed stage does to the rest of the run
    ///
    /// Default: continue
    async fn get_stage_failure_policy(&self) -> ConfigResult<StageFailurePolicy>;

    /// Whether evaluation runs reconcile remnants when the caller does not say
    ///
    /// Default: false
    async fn get_remnant_reconciliation(&self) -> ConfigResult<bool>;

    /// Operator-facing locale
    ///
    /// Default: pt-BR
    async fn get_locale(&self) -> ConfigResult<String>;
}
