// ==========================================
// Talhão APEX - pipeline and evaluation API
// ==========================================
// Starts consist/manejo runs through the shared PipelineRunner,
// exposes the run registry, the management parameters and the
// regional summaries of a finished run.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::parameters::ManagementParameters;
use crate::domain::run::RunRecord;
use crate::domain::types::ManagementLabel;
use crate::engine::events::SharedProgressSink;
use crate::engine::runner::{PipelineKind, PipelineOutput, PipelineRunner, RunHandle};
use crate::repository::{
    ParametersRepository, RegionLevel, RegionalReportRepository, RegionalTotal,
    RunRegistryRepository, Statistic,
};
use crate::store::TabularStore;
use std::sync::Arc;

pub struct ManejoApi {
    runner: Arc<PipelineRunner>,
    registry: RunRegistryRepository,
    parameters: ParametersRepository,
    reports: RegionalReportRepository,
}

impl ManejoApi {
    pub fn new(store: TabularStore, runner: Arc<PipelineRunner>) -> ApiResult<Self> {
        Ok(Self {
            registry: RunRegistryRepository::new(store.db_path())?,
            parameters: ParametersRepository::new(store.clone()),
            reports: RegionalReportRepository::new(store),
            runner,
        })
    }

    // ===== runs =====

    /// Start a run in the background, replacing any run in flight
    pub async fn start(&self, kind: PipelineKind, sink: SharedProgressSink) -> RunHandle {
        self.runner.start(kind, sink).await
    }

    pub async fn run_consist(&self, sink: SharedProgressSink) -> ApiResult<PipelineOutput> {
        Ok(self.start(PipelineKind::Consist, sink).await.wait().await?)
    }

    /// Run the evaluation; `remnants` None uses the configured default
    pub async fn run_manejo(&self, remnants: Option<bool>, sink: SharedProgressSink) -> ApiResult<PipelineOutput> {
        let kind = self.runner.manejo(remnants);
        Ok(self.start(kind, sink).await.wait().await?)
    }

    pub async fn cancel(&self) {
        self.runner.cancel_current().await;
    }

    // ===== registry =====

    pub fn list_runs(&self) -> ApiResult<Vec<RunRecord>> {
        Ok(self.registry.list()?)
    }

    pub fn get_run(&self, run_number: i64) -> ApiResult<RunRecord> {
        self.registry
            .find(run_number)?
            .ok_or_else(|| ApiError::NotFound(format!("run {}", run_number)))
    }

    // ===== parameters =====

    pub fn latest_parameters(&self) -> ApiResult<ManagementParameters> {
        Ok(self.parameters.latest()?)
    }

    pub fn save_parameters(&self, params: &ManagementParameters) -> ApiResult<()> {
        if params.interest_pct < 0.0 {
            return Err(ApiError::InvalidInput("interest must not be negative".to_string()));
        }
        Ok(self.parameters.append(params)?)
    }

    // ===== reports =====

    /// Area per final label and region code of one run
    pub fn regional_area(&self, run_number: i64, level: RegionLevel) -> ApiResult<Vec<RegionalTotal>> {
        let run = self.get_run(run_number)?;
        Ok(self
            .reports
            .by_region(&run.result_table, level, "Area", Statistic::Sum)?)
    }

    pub fn area_by_label(&self, run_number: i64) -> ApiResult<Vec<(ManagementLabel, f64)>> {
        let run = self.get_run(run_number)?;
        Ok(self.reports.area_by_label(&run.result_table)?)
    }
}
