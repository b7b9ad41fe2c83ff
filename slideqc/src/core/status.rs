//! Run and stage status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run created but not started.
    Idle,
    /// Run is executing stages.
    Running,
    /// All stages succeeded.
    Completed,
    /// Run finished but at least one optional stage failed.
    CompletedWithWarnings,
    /// A required stage failed, or the run failed before any stage.
    Failed,
    /// The run was cancelled by the caller.
    Cancelled,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithWarnings => write!(f, "completed_with_warnings"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithWarnings | Self::Failed | Self::Cancelled
        )
    }

    /// Returns true if the run produced a usable output directory.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithWarnings)
    }
}

/// The outcome of a single stage execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage process exited with the success status.
    Succeeded,
    /// The stage process exited with a non-success status, or failed to launch.
    Failed,
    /// The stage was never invoked.
    Skipped,
    /// The stage exceeded its timeout and was terminated.
    TimedOut,
    /// The stage was terminated by a cancellation request.
    Cancelled,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl StageOutcome {
    /// Returns true if the outcome counts as a stage failure.
    ///
    /// `Skipped` and `Cancelled` are not failures for policy purposes.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}
