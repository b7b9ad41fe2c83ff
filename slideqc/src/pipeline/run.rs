//! The pipeline run record.

use crate::core::{RunStatus, StageOutcome, StageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One end-to-end orchestrator execution against a single slide.
///
/// Owned exclusively by the controller while running; handed to the caller in
/// its terminal state. Stage results are always in stage-plan order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run identity; also the run directory name.
    pub run_id: String,
    /// The slide the run was submitted with.
    pub slide: PathBuf,
    /// The run's output directory. Immutable once created.
    pub output_dir: PathBuf,
    /// When the run record was created.
    pub created_at: DateTime<Utc>,
    /// The run's lifecycle status.
    pub status: RunStatus,
    /// One result per stage, in stage order.
    pub stage_results: Vec<StageResult>,
}

impl PipelineRun {
    /// Creates a run record in the `Idle` state.
    #[must_use]
    pub fn new(run_id: impl Into<String>, slide: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            slide: slide.into(),
            output_dir: output_dir.into(),
            created_at: Utc::now(),
            status: RunStatus::Idle,
            stage_results: Vec::new(),
        }
    }

    /// The stage outcomes in stage order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<StageOutcome> {
        self.stage_results.iter().map(|r| r.outcome).collect()
    }

    /// Looks up a stage result by name.
    #[must_use]
    pub fn stage_result(&self, stage: &str) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == stage)
    }
}
