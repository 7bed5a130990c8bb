//! Request-scoped trace of retrieval, reasoning, and scoring steps.
//!
//! A [`TraceLog`] is append-only. Cloning it shares the same buffer, so the
//! orchestrator and the two provider tasks can record into one log. Each
//! record is also emitted as a `tracing` event. Readers only ever get an
//! ordered copy via [`TraceLog::steps`].

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    Warning(String),
    Failed(String),
}

/// One timestamped step record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub step: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    steps: Arc<Mutex<Vec<TraceStep>>>,
}

/// An in-progress step. Finish it with [`StepTimer::ok`], [`StepTimer::warn`]
/// or [`StepTimer::fail`].
pub struct StepTimer {
    log: TraceLog,
    step: String,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, step: impl Into<String>) -> StepTimer {
        StepTimer {
            log: self.clone(),
            step: step.into(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    pub fn record(&self, step: TraceStep) {
        match &step.outcome {
            StepOutcome::Ok => {
                tracing::debug!(step = %step.step, elapsed_ms = step.elapsed_ms, "step ok")
            }
            StepOutcome::Warning(msg) => {
                tracing::warn!(step = %step.step, elapsed_ms = step.elapsed_ms, "{}", msg)
            }
            StepOutcome::Failed(msg) => {
                tracing::error!(step = %step.step, elapsed_ms = step.elapsed_ms, "{}", msg)
            }
        }
        // A poisoned buffer only means another recorder panicked; keep appending.
        let mut steps = self.steps.lock().unwrap_or_else(|e| e.into_inner());
        steps.push(step);
    }

    /// Ordered snapshot of every step recorded so far.
    pub fn steps(&self) -> Vec<TraceStep> {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn has_warnings(&self) -> bool {
        self.steps()
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Warning(_)))
    }
}

impl StepTimer {
    pub fn ok(self) {
        self.finish(StepOutcome::Ok)
    }

    pub fn warn(self, message: impl Into<String>) {
        self.finish(StepOutcome::Warning(message.into()))
    }

    pub fn fail(self, message: impl Into<String>) {
        self.finish(StepOutcome::Failed(message.into()))
    }

    fn finish(self, outcome: StepOutcome) {
        let elapsed_ms = self.clock.elapsed().as_millis() as u64;
        self.log.record(TraceStep {
            step: self.step,
            started_at: self.started_at,
            elapsed_ms,
            outcome,
        });
    }
}
