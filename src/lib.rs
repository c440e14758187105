// ==========================================
// Talhão APEX - core library
// ==========================================
// Stack: Rust + SQLite (rusqlite) + tokio
// Decision support: stand ledger reconciliation and the economic
// evaluation that labels each stand Reforma or Regeneração.
// ==========================================

rust_i18n::i18n!("locales", fallback = "pt-BR");

// ==========================================
// Modules
// ==========================================

// Tabular store over SQLite
pub mod store;

// Domain: stand codes, enumerations, parameters, run record
pub mod domain;

// Repositories: run registry, parameters, reports
pub mod repository;

// Engines: consist, manejo, stage runner
pub mod engine;

// Spreadsheet / CSV import
pub mod importer;

// config_kv settings
pub mod config;

// Connection setup (PRAGMAs, busy timeout)
pub mod db;

pub mod logging;

pub mod perf;

pub mod i18n;

// Facade for a shell or the CLI
pub mod api;

pub mod app;

// ==========================================
// Re-exports
// ==========================================

pub use domain::{
    AdjustmentCondition, AdjustmentReport, DecisionClass, ElevationClass, ManagementLabel,
    ManagementParameters, RunRecord, RunStatus, StandCode, StandKind,
};

pub use store::{ColumnDef, ColumnType, Dataset, LoadMode, Table, TabularStore, Value};

pub use engine::{
    ConsistencyEngine, ManejoEngine, PipelineKind, PipelineOutput, PipelineReport,
    PipelineRunner, StageFailurePolicy,
};

pub use api::{ConsistencyApi, ImportApi, ManejoApi};

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Talhão APEX";
