// ==========================================
// Talhão APEX - reconciliation engine
// ==========================================
// Stages (strict order):
//   1-4   normalize keys (IFPC, IFC, Orcamento, ClassesInclinacao)
//   5-7   IFC aggregates (lot, project, sub-region)
//   8-13  resolve Orcamento against six sources (Apex_temp_1..6)
//   14    apex_base_0 (first source with data wins)
//   15-16 apex_base_1 and stand age
//   17    validation counts
// ==========================================

pub mod aggregate;
pub mod ledger;
pub mod normalize;
pub mod resolve;
pub mod validate;

use crate::domain::validation::AdjustmentReport;
use crate::engine::error::EngineResult;
use crate::engine::events::PipelineReport;
use crate::engine::stage::StageRunner;
use crate::store::TabularStore;

pub use ledger::APEX_BASE_1;

/// Stage names, in run order
pub const CONSIST_STAGES: [&str; 17] = [
    "consist.normalize_ifpc",
    "consist.normalize_ifc",
    "consist.normalize_orcamento",
    "consist.normalize_slope",
    "consist.aggregate_lot",
    "consist.aggregate_project",
    "consist.aggregate_sub_region",
    "consist.resolve_ifpc",
    "consist.resolve_ifc",
    "consist.resolve_lot",
    "consist.resolve_project",
    "consist.resolve_sub_region",
    "consist.resolve_cadastro",
    "consist.merge_base",
    "consist.build_ledger",
    "consist.stand_age",
    "consist.validate",
];

pub struct ConsistencyEngine {
    store: TabularStore,
}

impl ConsistencyEngine {
    pub fn new(store: TabularStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TabularStore {
        &self.store
    }

    /// Run every stage through `runner`
    ///
    /// Returns the validation report when the final stage succeeded.
    pub fn run(&self, mut runner: StageRunner) -> (PipelineReport, Option<AdjustmentReport>) {
        let store = &self.store;
        let mut stages = CONSIST_STAGES.iter().copied();
        let mut next = || stages.next().unwrap_or("consist.unknown");

        let normalizations = [
            (normalize::IFPC, normalize::ifpc_updates()),
            (normalize::IFC, normalize::ifc_updates()),
            (normalize::ORCAMENTO, normalize::orcamento_updates()),
            (normalize::CLASSES_INCLINACAO, normalize::slope_updates()),
        ];
        for (table, updates) in &normalizations {
            runner.run(next(), || Ok(normalize::normalize(store, table, updates)?));
        }

        for agg in [
            aggregate::lot_level(),
            aggregate::project_level(),
            aggregate::sub_region_level(),
        ] {
            runner.run(next(), || Ok(store.aggregate(&agg)?));
        }

        for join in resolve::temp_joins() {
            runner.run(next(), || Ok(store.join_with_fallback(&join)?));
        }

        runner.run(next(), || Ok(resolve::build_base(store)?));
        runner.run(next(), || Ok(ledger::build_ledger(store)?));
        runner.run(next(), || Ok(ledger::compute_age(store)?));
        let adjustments = runner.run(next(), || Ok(validate::validate(store)?));

        (runner.finish(), adjustments)
    }

    /// Recount the validation conditions
    pub fn validate(&self) -> EngineResult<AdjustmentReport> {
        Ok(validate::validate(&self.store)?)
    }

    /// Apply operator corrections and return the fresh report
    pub fn save_corrections(&self, rows: &[Vec<String>]) -> EngineResult<AdjustmentReport> {
        validate::save_corrections(&self.store, rows)?;
        self.validate()
    }

    /// Delete ledger rows and return the fresh report
    pub fn delete_rows(&self, ids: &[i64]) -> EngineResult<AdjustmentReport> {
        validate::delete_rows(&self.store, ids)?;
        self.validate()
    }
}
