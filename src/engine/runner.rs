// ==========================================
// Talhão APEX - pipeline runner
// ==========================================
// One in-flight run per store. Starting a run cancels the previous one
// and waits for it to stop before the new worker is spawned.
// Each run executes on a tokio blocking thread; the caller gets a
// RunHandle to cancel it or await its output.
// ==========================================

use crate::config::PipelineConfigReader;
use crate::domain::validation::AdjustmentReport;
use crate::engine::consist::{ConsistencyEngine, CONSIST_STAGES};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{PipelineReport, SharedProgressSink};
use crate::engine::manejo::{total_stages, ManejoEngine, ManejoOutcome};
use crate::engine::stage::{CancelToken, StageFailurePolicy, StageRunner};
use crate::store::TabularStore;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineKind {
    /// Reconciliation: imported tables to apex_base_1
    Consist,
    /// Economic evaluation of apex_base_1
    Manejo { remnant_reconciliation: bool },
}

impl PipelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Consist => "consist",
            PipelineKind::Manejo { .. } => "manejo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineOutput {
    Consist {
        report: PipelineReport,
        adjustments: Option<AdjustmentReport>,
    },
    Manejo(ManejoOutcome),
}

impl PipelineOutput {
    pub fn report(&self) -> &PipelineReport {
        match self {
            PipelineOutput::Consist { report, .. } => report,
            PipelineOutput::Manejo(outcome) => &outcome.report,
        }
    }
}

/// Failure slot of an evaluation that could not be planned
pub const PLAN_STAGE: &str = "manejo.plan_run";

/// Run one pipeline to completion on the current thread
///
/// The sink receives exactly one finished event, also when planning fails.
pub fn execute(
    store: TabularStore,
    kind: PipelineKind,
    policy: StageFailurePolicy,
    cancel: CancelToken,
    sink: SharedProgressSink,
) -> EngineResult<PipelineOutput> {
    match kind {
        PipelineKind::Consist => {
            let runner = StageRunner::new("consist", CONSIST_STAGES.len(), policy, cancel, sink);
            let (report, adjustments) = ConsistencyEngine::new(store).run(runner);
            Ok(PipelineOutput::Consist { report, adjustments })
        }
        PipelineKind::Manejo {
            remnant_reconciliation,
        } => {
            let runner = StageRunner::new(
                "manejo",
                total_stages(remnant_reconciliation),
                policy,
                cancel,
                sink,
            );
            let planned = ManejoEngine::new(store).and_then(|engine| {
                let record = engine.plan_run(remnant_reconciliation)?;
                Ok((engine, record))
            });
            match planned {
                Ok((engine, record)) => Ok(PipelineOutput::Manejo(engine.run(record, runner))),
                Err(e) => {
                    runner.abandon(PLAN_STAGE, &e);
                    Err(e)
                }
            }
        }
    }
}

// ==========================================
// RunHandle
// ==========================================

/// Caller side of a started run
pub struct RunHandle {
    kind: PipelineKind,
    cancel: CancelToken,
    output: oneshot::Receiver<EngineResult<PipelineOutput>>,
}

impl RunHandle {
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Stop before the next stage; the current stage finishes
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run's output
    pub async fn wait(self) -> EngineResult<PipelineOutput> {
        self.output
            .await
            .map_err(|_| EngineError::Join("pipeline worker stopped without output".to_string()))?
    }
}

struct InFlight {
    kind: PipelineKind,
    cancel: CancelToken,
    worker: JoinHandle<()>,
}

// ==========================================
// PipelineRunner
// ==========================================

pub struct PipelineRunner {
    store: TabularStore,
    policy: StageFailurePolicy,
    default_remnant_reconciliation: bool,
    in_flight: Mutex<Option<InFlight>>,
}

impl PipelineRunner {
    pub fn new(store: TabularStore, policy: StageFailurePolicy) -> Self {
        Self {
            store,
            policy,
            default_remnant_reconciliation: false,
            in_flight: Mutex::new(None),
        }
    }

    /// Runner configured from the config store
    pub async fn from_config(store: TabularStore, config: &dyn PipelineConfigReader) -> EngineResult<Self> {
        let policy = config
            .get_stage_failure_policy()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let remnants = config
            .get_remnant_reconciliation()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(Self {
            store,
            policy,
            default_remnant_reconciliation: remnants,
            in_flight: Mutex::new(None),
        })
    }

    pub fn policy(&self) -> StageFailurePolicy {
        self.policy
    }

    /// Evaluation kind with the configured remnant default
    pub fn manejo(&self, remnant_reconciliation: Option<bool>) -> PipelineKind {
        PipelineKind::Manejo {
            remnant_reconciliation: remnant_reconciliation.unwrap_or(self.default_remnant_reconciliation),
        }
    }

    /// Cancel the in-flight run, if any, and wait for it to stop
    pub async fn cancel_current(&self) {
        let mut guard = self.in_flight.lock().await;
        if let Some(previous) = guard.take() {
            Self::stop(previous).await;
        }
    }

    async fn stop(previous: InFlight) {
        previous.cancel.cancel();
        if let Err(e) = previous.worker.await {
            warn!(pipeline = previous.kind.name(), error = %e, "previous run ended abnormally");
        }
    }

    /// Start a run, replacing any run in flight
    pub async fn start(&self, kind: PipelineKind, sink: SharedProgressSink) -> RunHandle {
        let mut guard = self.in_flight.lock().await;
        if let Some(previous) = guard.take() {
            info!(previous = previous.kind.name(), next = kind.name(), "replacing in-flight run");
            Self::stop(previous).await;
        }

        let cancel = CancelToken::new();
        let (tx, rx) = oneshot::channel();
        let store = self.store.clone();
        let policy = self.policy;
        let worker_cancel = cancel.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let output = execute(store, kind, policy, worker_cancel, sink);
            if tx.send(output).is_err() {
                tracing::debug!(pipeline = kind.name(), "run handle dropped before output");
            }
        });

        *guard = Some(InFlight {
            kind,
            cancel: cancel.clone(),
            worker,
        });
        RunHandle {
            kind,
            cancel,
            output: rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::{noop_sink, ProgressSink};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_kind_names() {
        assert_eq!(PipelineKind::Consist.name(), "consist");
        let runner = PipelineRunner::new(TabularStore::new("unused.db"), StageFailurePolicy::default());
        assert_eq!(
            runner.manejo(None),
            PipelineKind::Manejo {
                remnant_reconciliation: false
            }
        );
        assert_eq!(
            runner.manejo(Some(true)),
            PipelineKind::Manejo {
                remnant_reconciliation: true
            }
        );
    }

    #[tokio::test]
    async fn test_consist_on_empty_store_reports_failures_without_panicking() {
        let f = NamedTempFile::new().unwrap();
        let runner = PipelineRunner::new(
            TabularStore::new(f.path().to_str().unwrap()),
            StageFailurePolicy::ContinueOnError,
        );
        let handle = runner.start(PipelineKind::Consist, noop_sink()).await;
        let output = handle.wait().await.unwrap();
        let report = output.report();
        assert_eq!(report.total, CONSIST_STAGES.len());
        assert!(!report.is_success());
        assert!(!report.cancelled);
    }

    #[derive(Default)]
    struct FinishCounter {
        finished: std::sync::Mutex<Vec<PipelineReport>>,
    }

    impl ProgressSink for FinishCounter {
        fn on_progress(&self, _current: usize, _total: usize) {}

        fn on_finished(&self, report: &PipelineReport) {
            self.finished.lock().unwrap().push(report.clone());
        }
    }

    #[test]
    fn test_unplannable_manejo_still_finishes_once() {
        let f = NamedTempFile::new().unwrap();
        std::fs::write(f.path(), b"this is not a sqlite database, only junk bytes").unwrap();
        let counter = Arc::new(FinishCounter::default());

        let result = execute(
            TabularStore::new(f.path().to_str().unwrap()),
            PipelineKind::Manejo {
                remnant_reconciliation: false,
            },
            StageFailurePolicy::ContinueOnError,
            CancelToken::new(),
            counter.clone(),
        );
        assert!(result.is_err());

        let finished = counter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        let report = &finished[0];
        assert_eq!(report.pipeline, "manejo");
        assert_eq!(report.total, total_stages(false));
        assert_eq!(report.completed, 0);
        assert!(report.aborted);
        assert_eq!(report.failed[0].stage, PLAN_STAGE);
    }

    #[tokio::test]
    async fn test_new_run_replaces_cancelled_one() {
        let f = NamedTempFile::new().unwrap();
        let runner = PipelineRunner::new(
            TabularStore::new(f.path().to_str().unwrap()),
            StageFailurePolicy::AbortOnError,
        );
        let first = runner.start(PipelineKind::Consist, noop_sink()).await;
        let second = runner.start(PipelineKind::Consist, noop_sink()).await;

        // the first run either finished or was cancelled; it still yields output
        assert!(first.wait().await.is_ok());
        let report = second.wait().await.unwrap();
        assert!(report.report().aborted);
    }
}
