//! Stage specifications, the default stage plan, and the process runner.

mod plan;
mod runner;
mod spec;

pub use plan::{
    build_stage_plan, STAGE_OVERLAY, STAGE_QC, STAGE_REPORT, STAGE_TISSUE_DETECT,
};
pub use runner::{StageRunner, DEFAULT_KILL_GRACE, STDERR_TAIL_LINES};
pub use spec::StageSpec;
