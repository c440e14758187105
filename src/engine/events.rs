// ==========================================
// Talhão APEX - pipeline progress events
// ==========================================
// The engine defines the sink trait; callers (CLI, operator shell,
// tests) plug in an implementation. The engine never depends on who
// is listening.
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

// ==========================================
// Report
// ==========================================

/// One failed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

/// Outcome of one pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Pipeline name (`consist` | `manejo`)
    pub pipeline: String,
    /// Declared number of stages
    pub total: usize,
    /// Stages that ran to completion
    pub completed: usize,
    pub failed: Vec<StageFailure>,
    pub cancelled: bool,
    /// Stopped early under the abort policy
    pub aborted: bool,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    /// Every stage ran and none failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled && !self.aborted
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

// ==========================================
// Events
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineEvent {
    Progress { current: usize, total: usize },
    StageFailed { stage: String, message: String },
    Finished(PipelineReport),
}

// ==========================================
// Sink trait
// ==========================================

/// Receives progress from a running pipeline
///
/// Called from the pipeline worker thread; implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// After every stage, failed ones included
    fn on_progress(&self, current: usize, total: usize);

    fn on_stage_failed(&self, _stage: &str, _message: &str) {}

    /// Exactly once per pipeline execution
    fn on_finished(&self, report: &PipelineReport);
}

/// Sink that discards everything (tests, headless runs)
#[derive(Debug, Clone, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn on_progress(&self, current: usize, total: usize) {
        tracing::trace!(current, total, "progress (no sink)");
    }

    fn on_finished(&self, report: &PipelineReport) {
        tracing::debug!(
            pipeline = %report.pipeline,
            completed = report.completed,
            failed = report.failed_count(),
            "pipeline finished (no sink)"
        );
    }
}

/// Sink that forwards events over a tokio unbounded channel
///
/// A dropped receiver is not an error: the run keeps going.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: UnboundedSender<PipelineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: UnboundedSender<PipelineEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("progress receiver dropped");
        }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, current: usize, total: usize) {
        self.send(PipelineEvent::Progress { current, total });
    }

    fn on_stage_failed(&self, stage: &str, message: &str) {
        self.send(PipelineEvent::StageFailed {
            stage: stage.to_string(),
            message: message.to_string(),
        });
    }

    fn on_finished(&self, report: &PipelineReport) {
        self.send(PipelineEvent::Finished(report.clone()));
    }
}

/// Shared sink handle
pub type SharedProgressSink = Arc<dyn ProgressSink>;

/// Sink used when the caller does not provide one
pub fn noop_sink() -> SharedProgressSink {
    Arc::new(NoOpProgressSink)
}
