// ==========================================
// Talhão APEX - best-effort stage runner
// ==========================================
// Runs named stages strictly in order:
// - cancellation is checked before each stage
// - each stage runs inside a PerfGuard
// - a failure is logged and recorded; the failure policy decides
//   whether the next stage runs
// - progress is reported after every stage, failed ones included
// There is no rollback across stages.
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{PipelineReport, SharedProgressSink, StageFailure};
use crate::perf::PerfGuard;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

// ==========================================
// Failure policy
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StageFailurePolicy {
    /// Log the failure and run the next stage
    #[default]
    ContinueOnError,
    /// Stop at the first failure
    AbortOnError,
}

impl StageFailurePolicy {
    /// Parse a config value (`continue` | `abort`)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Some(StageFailurePolicy::ContinueOnError),
            "abort" => Some(StageFailurePolicy::AbortOnError),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageFailurePolicy::ContinueOnError => "continue",
            StageFailurePolicy::AbortOnError => "abort",
        }
    }
}

// ==========================================
// Cancellation
// ==========================================

/// Cooperative cancellation flag shared with the runner
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ==========================================
// StageRunner
// ==========================================

pub struct StageRunner {
    pipeline: &'static str,
    total: usize,
    current: usize,
    completed: usize,
    failed: Vec<StageFailure>,
    cancelled: bool,
    aborted: bool,
    policy: StageFailurePolicy,
    cancel: CancelToken,
    sink: SharedProgressSink,
    started: Instant,
}

impl StageRunner {
    pub fn new(
        pipeline: &'static str,
        total: usize,
        policy: StageFailurePolicy,
        cancel: CancelToken,
        sink: SharedProgressSink,
    ) -> Self {
        info!(pipeline, total, policy = policy.as_str(), "pipeline started");
        Self {
            pipeline,
            total,
            current: 0,
            completed: 0,
            failed: Vec::new(),
            cancelled: false,
            aborted: false,
            policy,
            cancel,
            sink,
            started: Instant::now(),
        }
    }

    /// Whether no further stage will run
    pub fn is_stopped(&self) -> bool {
        self.cancelled || self.aborted
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Run one stage
    ///
    /// Returns the stage's value, or None when it failed or was skipped.
    pub fn run<T>(&mut self, stage: &'static str, f: impl FnOnce() -> EngineResult<T>) -> Option<T> {
        if self.is_stopped() {
            return None;
        }
        if self.cancel.is_cancelled() {
            warn!(pipeline = self.pipeline, stage, "cancelled before stage");
            self.cancelled = true;
            return None;
        }

        let result = {
            let _perf = PerfGuard::new(stage);
            f()
        };
        self.current += 1;

        let out = match result {
            Ok(v) => {
                self.completed += 1;
                Some(v)
            }
            Err(e) => {
                let message = e.to_string();
                error!(pipeline = self.pipeline, stage, error = %message, "stage failed");
                self.sink.on_stage_failed(stage, &message);
                self.failed.push(StageFailure {
                    stage: stage.to_string(),
                    message,
                });
                if self.policy == StageFailurePolicy::AbortOnError {
                    self.aborted = true;
                }
                None
            }
        };

        self.sink.on_progress(self.current, self.total);
        out
    }

    /// Close a run that could not start its stage list
    ///
    /// `stage` is recorded as failed and the run as aborted; the sink
    /// still receives its single finished event.
    pub fn abandon(mut self, stage: &str, error: &EngineError) -> PipelineReport {
        let message = error.to_string();
        error!(pipeline = self.pipeline, stage, error = %message, "pipeline could not start");
        self.sink.on_stage_failed(stage, &message);
        self.failed.push(StageFailure {
            stage: stage.to_string(),
            message,
        });
        self.aborted = true;
        self.finish()
    }

    /// Close the run and notify the sink
    pub fn finish(self) -> PipelineReport {
        let report = PipelineReport {
            pipeline: self.pipeline.to_string(),
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            cancelled: self.cancelled,
            aborted: self.aborted,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        };
        info!(
            pipeline = %report.pipeline,
            completed = report.completed,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            aborted = report.aborted,
            elapsed_ms = report.elapsed_ms,
            "pipeline finished"
        );
        self.sink.on_finished(&report);
        report
    }
}
