// ==========================================
// Talhão APEX - economic evaluation engine
// ==========================================
// Stages (strict order):
//   1-8   reference tables: schedules, present values, slope, harvest
//   9     Apex_Manejo_N from apex_base_1 (run registered here)
//   10-12 spacing, productivity, coppice losses
//   13-28 unit costs per scenario, cost ratio
//   29-31 decision tree, remnant keys, label
//   then remnant reconciliation (3 stages) or own labels (1 stage)
//   and the parameter snapshot (2 stages)
// Parameters are read once, before the first stage.
// ==========================================

pub mod costs;
pub mod decision;
pub mod lookup;
pub mod productivity;
pub mod remnant;
pub mod scenario;
pub mod schedule;
pub mod slope;

use crate::domain::parameters::ManagementParameters;
use crate::domain::run::{next_run_number, RunRecord, RESULT_TABLE_PREFIX};
use crate::domain::types::RunStatus;
use crate::engine::consist::APEX_BASE_1;
use crate::engine::error::EngineResult;
use crate::engine::events::PipelineReport;
use crate::engine::stage::StageRunner;
use crate::repository::{ParametersRepository, RunRegistryRepository};
use crate::store::TabularStore;
use chrono::Local;
use scenario::Scenario;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use remnant::FINAL_LABEL_COLUMN;

/// Stages every run executes
pub const CORE_STAGES: [&str; 31] = [
    "manejo.build_reform_schedule",
    "manejo.align_reform_schedule",
    "manejo.discount_ref_reg",
    "manejo.discount_ref_ref",
    "manejo.summarize_ref_reg",
    "manejo.summarize_ref_ref",
    "manejo.slope_fronts",
    "manejo.harvest_pond",
    "manejo.create_run_table",
    "manejo.basal_spacing",
    "manejo.productivity",
    "manejo.coppice_losses",
    "manejo.silviculture_ref_reg",
    "manejo.silviculture_ref_ref",
    "manejo.harvest_ref_reg",
    "manejo.harvest_ref_ref",
    "manejo.support_ref_reg",
    "manejo.support_ref_ref",
    "manejo.internal_road_ref_reg",
    "manejo.internal_road_ref_ref",
    "manejo.harvest_total_ref_reg",
    "manejo.harvest_total_ref_ref",
    "manejo.transport",
    "manejo.admin_ref_reg",
    "manejo.admin_ref_ref",
    "manejo.delivered_ref_reg",
    "manejo.delivered_ref_ref",
    "manejo.cost_ratio",
    "manejo.decision",
    "manejo.remnant_keys",
    "manejo.management_label",
];

/// Remnant reconciliation stages
pub const REMNANT_STAGES: [&str; 3] = [
    "manejo.remnant_table",
    "manejo.remnant_table_keys",
    "manejo.final_labels",
];

pub const OWN_LABEL_STAGE: &str = "manejo.final_labels";

pub const SNAPSHOT_STAGES: [&str; 2] = ["manejo.history_table", "manejo.parameters_snapshot"];

/// Stage names of one run, in order (34 or 36)
pub fn stage_names(remnant_reconciliation: bool) -> Vec<&'static str> {
    let mut names = CORE_STAGES.to_vec();
    if remnant_reconciliation {
        names.extend(REMNANT_STAGES);
    } else {
        names.push(OWN_LABEL_STAGE);
    }
    names.extend(SNAPSHOT_STAGES);
    names
}

pub fn total_stages(remnant_reconciliation: bool) -> usize {
    stage_names(remnant_reconciliation).len()
}

/// What a finished run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManejoOutcome {
    pub run_number: i64,
    pub run_id: String,
    pub result_table: String,
    pub remnant_table: Option<String>,
    pub status: RunStatus,
    pub report: PipelineReport,
}

/// Registry status of a finished report
pub fn status_of(report: &PipelineReport) -> RunStatus {
    if report.cancelled {
        RunStatus::Cancelled
    } else if report.is_success() {
        RunStatus::Completed
    } else {
        RunStatus::CompletedWithErrors
    }
}

pub struct ManejoEngine {
    store: TabularStore,
    parameters: ParametersRepository,
    registry: RunRegistryRepository,
}

impl ManejoEngine {
    pub fn new(store: TabularStore) -> EngineResult<Self> {
        let registry = RunRegistryRepository::new(store.db_path())?;
        Ok(Self {
            parameters: ParametersRepository::new(store.clone()),
            registry,
            store,
        })
    }

    pub fn store(&self) -> &TabularStore {
        &self.store
    }

    pub fn registry(&self) -> &RunRegistryRepository {
        &self.registry
    }

    /// Number the next run and read its parameters
    pub fn plan_run(&self, remnant_reconciliation: bool) -> EngineResult<RunRecord> {
        let existing = self.store.list_tables(Some(RESULT_TABLE_PREFIX))?;
        let run_number = next_run_number(&existing, self.registry.max_run_number()?);
        let params = self.parameters.latest()?;
        let record = RunRecord::start(run_number, remnant_reconciliation, params, Local::now().naive_local());
        info!(
            run_number,
            run_id = %record.run_id,
            remnant_reconciliation,
            "evaluation run planned"
        );
        Ok(record)
    }

    /// Run every stage of `record` through `runner`
    pub fn run(&self, record: RunRecord, mut runner: StageRunner) -> ManejoOutcome {
        let store = &self.store;
        let params: &ManagementParameters = &record.parameters;
        let table = record.result_table.as_str();
        let mut stages = stage_names(record.remnant_reconciliation).into_iter();
        let mut next = || stages.next().unwrap_or("manejo.unknown");

        // ===== reference tables =====
        runner.run(next(), || schedule::build_reform_schedule(store));
        runner.run(next(), || schedule::align_reform_schedule(store));
        for scenario in Scenario::ALL {
            runner.run(next(), || schedule::discount_schedule(store, scenario, params));
        }
        for scenario in Scenario::ALL {
            runner.run(next(), || schedule::summarize_present_value(store, scenario));
        }
        runner.run(next(), || slope::summarize_slope_fronts(store));
        runner.run(next(), || slope::weight_harvest_costs(store));

        // ===== run table =====
        runner.run(next(), || {
            let copied = store.copy_table(APEX_BASE_1, table)?;
            self.registry.insert(&record)?;
            info!(table, rows = copied, "run table created");
            Ok(copied)
        });
        runner.run(next(), || productivity::apply_basal_spacing(store, table));
        runner.run(next(), || productivity::apply_productivity(store, table));
        runner.run(next(), || productivity::apply_coppice_losses(store, table, params));

        // ===== unit costs =====
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_silviculture_cost(store, table, scenario, params));
        }
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_harvest_cost(store, table, scenario, params));
        }
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_support_cost(store, table, scenario, params));
        }
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_internal_road_cost(store, table, scenario, params));
        }
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_harvest_total(store, table, scenario));
        }
        runner.run(next(), || costs::apply_transport(store, table));
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_admin_cost(store, table, scenario, params));
        }
        for scenario in Scenario::ALL {
            runner.run(next(), || costs::apply_delivered_cost(store, table, scenario, params));
        }
        runner.run(next(), || costs::apply_cost_ratio(store, table));

        // ===== decision =====
        runner.run(next(), || decision::apply_decision(store, table, params));
        runner.run(next(), || remnant::apply_remnant_keys(store, table));
        runner.run(next(), || decision::apply_management_label(store, table));

        match record.remnant_table.as_deref() {
            Some(t700) => {
                runner.run(next(), || remnant::build_remnant_table(store, table, t700));
                runner.run(next(), || remnant::apply_remnant_keys(store, t700));
                runner.run(next(), || remnant::resolve_final_labels(store, table, Some(t700)));
            }
            None => {
                runner.run(next(), || remnant::resolve_final_labels(store, table, None));
            }
        }

        // ===== parameter snapshot =====
        runner.run(next(), || Ok(self.parameters.ensure_history_table()?));
        runner.run(next(), || Ok(self.parameters.snapshot_to_history()?));

        let report = runner.finish();
        let status = status_of(&report);
        if let Err(e) = self.registry.complete(
            record.run_number,
            status,
            report.failed_count(),
            Local::now().naive_local(),
        ) {
            warn!(run_number = record.run_number, error = %e, "run registry not updated");
        }

        ManejoOutcome {
            run_number: record.run_number,
            run_id: record.run_id,
            result_table: record.result_table,
            remnant_table: record.remnant_table,
            status,
            report,
        }
    }
}
