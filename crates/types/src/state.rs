//! Pipeline state machine states

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// State of one plugin pipeline.
///
/// The happy path is `Pending → Checking → CheckDone → Downloading →
/// DownloadDone → Executing → Completed`. `Failed` and `Skipped` are
/// reachable from any non-terminal state, `Cancelled` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Checking,
    CheckDone,
    Downloading,
    DownloadDone,
    Executing,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl PipelineState {
    /// Whether the pipeline can make no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed
                | PipelineState::Failed
                | PipelineState::Skipped
                | PipelineState::Cancelled
        )
    }

    /// The active state entered when `phase` begins.
    #[must_use]
    pub fn entering(phase: Phase) -> Self {
        match phase {
            Phase::Check => PipelineState::Checking,
            Phase::Download => PipelineState::Downloading,
            Phase::Execute => PipelineState::Executing,
        }
    }

    /// The state reached when `phase` finishes successfully.
    ///
    /// A finished execute phase completes the pipeline.
    #[must_use]
    pub fn after(phase: Phase) -> Self {
        match phase {
            Phase::Check => PipelineState::CheckDone,
            Phase::Download => PipelineState::DownloadDone,
            Phase::Execute => PipelineState::Completed,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Pending => "pending",
            PipelineState::Checking => "checking",
            PipelineState::CheckDone => "check-done",
            PipelineState::Downloading => "downloading",
            PipelineState::DownloadDone => "download-done",
            PipelineState::Executing => "executing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
            PipelineState::Skipped => "skipped",
            PipelineState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Completed.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(PipelineState::Skipped.is_terminal());
        assert!(PipelineState::Cancelled.is_terminal());
        assert!(!PipelineState::Pending.is_terminal());
        assert!(!PipelineState::Executing.is_terminal());
    }

    #[test]
    fn phase_transitions() {
        assert_eq!(PipelineState::entering(Phase::Check), PipelineState::Checking);
        assert_eq!(PipelineState::after(Phase::Download), PipelineState::DownloadDone);
        assert_eq!(PipelineState::after(Phase::Execute), PipelineState::Completed);
    }
}
