//! Error types for the slideqc orchestrator.
//!
//! Each layer has its own error enum; `PipelineError` is the umbrella type
//! returned to callers. Stage failures are not errors at this level: they are
//! recorded per stage as [`crate::core::StageResult`] and surface through the
//! run status.

use std::path::PathBuf;
use thiserror::Error;

/// A malformed run request, rejected before any side effect.
#[derive(Debug, Clone, Error)]
pub enum UsageError {
    /// The slide file does not exist or is not a regular file.
    #[error("slide file not found: {0}")]
    SlideNotFound(PathBuf),

    /// The slide file extension is not a supported WSI format.
    #[error("unsupported slide format: {0} (supported: {1})")]
    UnsupportedFormat(PathBuf, String),
}

/// The installed toolchain could not be located.
#[derive(Debug, Clone, Error)]
pub enum EnvironmentError {
    /// No candidate location contained both required markers.
    #[error("runtime environment not found; candidates tried: {}",
        .candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    NotFound {
        /// Every candidate root that was checked, in precedence order.
        candidates: Vec<PathBuf>,
    },
}

/// A failure while preparing the run workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The source slide disappeared or was never there.
    #[error("slide source not found: {0}")]
    SourceNotFound(PathBuf),

    /// The run directory already exists; run IDs must never be reused.
    #[error("run directory already exists: {0}")]
    DestinationExists(PathBuf),

    /// An underlying IO failure during directory creation or staging.
    #[error("workspace IO failure: {0}")]
    Io(#[from] std::io::Error),
}

/// The umbrella error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run request was invalid.
    #[error("{0}")]
    Usage(#[from] UsageError),

    /// The runtime environment could not be resolved.
    #[error("{0}")]
    Environment(#[from] EnvironmentError),

    /// The workspace could not be prepared.
    #[error("{0}")]
    Workspace(#[from] WorkspaceError),

    /// An internal orchestrator failure (e.g. a panicked run task).
    #[error("internal error: {0}")]
    Internal(String),
}
