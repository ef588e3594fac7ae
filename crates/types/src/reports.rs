//! Report type definitions handed to external consumers
//!
//! These are the engine's outputs for the persistence and rendering
//! collaborators: per-phase outcomes, per-pipeline terminal reports, and the
//! run-level classification. All are plain serializable data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phase::Phase;
use crate::snapshot::PhaseSnapshot;
use crate::state::PipelineState;

/// Outcome classification for one completed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Success,
    Failed,
    Skipped,
}

/// Result of one phase of one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOutcome {
    /// Which phase this outcome describes
    pub phase: Phase,
    /// Success / failure / skip classification
    pub status: PhaseStatus,
    /// Short human-readable summary (exit code, skip reason, ...)
    pub summary: String,
}

/// Terminal report for one plugin pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Plugin name
    pub plugin: String,
    /// Terminal state the pipeline reached
    pub state: PipelineState,
    /// Per-phase outcomes in pipeline order
    pub outcomes: Vec<PhaseOutcome>,
    /// Frozen metrics snapshots per completed phase
    pub phase_metrics: BTreeMap<Phase, PhaseSnapshot>,
    /// Failure classification when `state` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Tail of the pipeline's output and error events, for failure reporting
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_output: Vec<String>,
    /// Total pipeline wall-clock time
    pub duration_ms: u64,
}

/// Exit classification for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunClassification {
    /// Every pipeline reached `Completed` or `Skipped`
    Success,
    /// At least one pipeline failed while at least one other completed
    PartialFailure,
    /// Every non-skipped pipeline failed
    TotalFailure,
}

/// Completion summary for one scheduler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier for this run
    pub run_id: Uuid,
    /// Per-pipeline terminal reports, in plugin submission order
    pub pipelines: Vec<PipelineReport>,
    /// Overall exit classification
    pub classification: RunClassification,
    /// Whether the run was cut short by a cancellation request
    pub cancelled: bool,
    /// Total run wall-clock time
    pub duration_ms: u64,
}

impl RunReport {
    /// Classify a run from its pipelines' terminal states.
    ///
    /// Cancelled pipelines count as non-success: a run where everything was
    /// cancelled or failed classifies as total failure.
    #[must_use]
    pub fn classify(pipelines: &[PipelineReport]) -> RunClassification {
        let any_failed = pipelines.iter().any(|p| {
            matches!(p.state, PipelineState::Failed | PipelineState::Cancelled)
        });
        let any_completed = pipelines
            .iter()
            .any(|p| p.state == PipelineState::Completed);

        if !any_failed {
            RunClassification::Success
        } else if any_completed {
            RunClassification::PartialFailure
        } else {
            RunClassification::TotalFailure
        }
    }
}
