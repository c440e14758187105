// ==========================================
// Talhão APEX - engine layer
// ==========================================
// consist: imported tables -> apex_base_1 + validation counts
// manejo:  apex_base_1 -> Apex_Manejo_N (+ t700, history, registry)
// stage/events/runner: ordered best-effort execution, progress,
// one in-flight run per store
// ==========================================

pub mod consist;
pub mod error;
pub mod events;
pub mod manejo;
pub mod runner;
pub mod stage;

pub use consist::{ConsistencyEngine, APEX_BASE_1, CONSIST_STAGES};
pub use error::{EngineError, EngineResult};
pub use events::{
    noop_sink, ChannelProgressSink, NoOpProgressSink, PipelineEvent, PipelineReport,
    ProgressSink, SharedProgressSink, StageFailure,
};
pub use manejo::{ManejoEngine, ManejoOutcome, FINAL_LABEL_COLUMN};
pub use runner::{PipelineKind, PipelineOutput, PipelineRunner, RunHandle};
pub use stage::{CancelToken, StageFailurePolicy, StageRunner};
