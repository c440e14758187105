// ==========================================
// Talhão APEX - domain layer
// ==========================================
// Stand codes, enumerations, management parameters,
// validation conditions and the run record.
// No storage access and no pipeline logic here.
// ==========================================

pub mod parameters;
pub mod run;
pub mod stand_code;
pub mod types;
pub mod validation;

pub use parameters::ManagementParameters;
pub use run::{remnant_table_name, result_table_name, RunRecord};
pub use stand_code::StandCode;
pub use types::{
    DecisionClass, ElevationClass, ManagementLabel, MaterialOrigin, Rotation, RunStatus,
    StandKind,
};
pub use validation::{AdjustmentCondition, AdjustmentReport, ConditionCount};
