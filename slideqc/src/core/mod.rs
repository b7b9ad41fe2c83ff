//! Core data model: statuses, events, and stage results.

mod event;
mod result;
mod status;

pub use event::{LogEvent, PipelineEvent, RunPhase, StatusEvent, StreamKind};
pub use result::StageResult;
pub use status::{RunStatus, StageOutcome};
