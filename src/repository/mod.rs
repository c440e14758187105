// ==========================================
// Talhão APEX - repositories
// ==========================================
// Data access only; no evaluation rules live here.
// All SQL is parameterized.
// ==========================================

pub mod error;
pub mod parameters_repo;
pub mod report_repo;
pub mod run_registry_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use parameters_repo::{ParametersRepository, PARAMETERS_HISTORY_TABLE, PARAMETERS_TABLE};
pub use report_repo::{RegionLevel, RegionalReportRepository, RegionalTotal, Statistic};
pub use run_registry_repo::RunRegistryRepository;
