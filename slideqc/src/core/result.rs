//! Per-stage execution results.

use crate::core::StageOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of one stage invocation (or skip).
///
/// Appended to a run by the controller, one per stage, in stage order.
/// Never mutated after being appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage name.
    pub stage: String,
    /// How the stage ended.
    pub outcome: StageOutcome,
    /// The process exit code, when the process ran to exit.
    pub exit_code: Option<i32>,
    /// When the stage started (or was recorded as skipped).
    pub started_at: DateTime<Utc>,
    /// When the stage finished.
    pub finished_at: DateTime<Utc>,
    /// The last lines of the stage's standard error, for diagnostics.
    pub stderr_tail: Vec<String>,
}

impl StageResult {
    /// Creates a result for a stage that was never invoked.
    #[must_use]
    pub fn skipped(stage: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            stage: stage.into(),
            outcome: StageOutcome::Skipped,
            exit_code: None,
            started_at: now,
            finished_at: now,
            stderr_tail: Vec::new(),
        }
    }

    /// Wall-clock duration of the stage.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
