//! # Slideqc
//!
//! Pipeline orchestrator for whole-slide-image (WSI) quality control.
//!
//! Slideqc sequences the external stages of a WSI analysis run - tissue
//! detection, QC inference, report generation, and overlay generation - over
//! an isolated per-run workspace:
//!
//! - **Sequential stage execution**: each stage consumes the previous stage's
//!   artifacts; stage i+1 never starts before stage i has exited
//! - **Partial-failure policy**: a required stage failing fails the run; an
//!   optional stage failing downgrades it to completed-with-warnings
//! - **Event-driven observability**: log and status events fan out to any
//!   number of subscribers without stalling stage execution
//! - **Cancellation handling**: cooperative at stage boundaries, preemptive
//!   (graceful-then-forceful termination) within a running stage
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use slideqc::prelude::*;
//! use std::sync::Arc;
//!
//! let bus = Arc::new(EventBus::new());
//! bus.attach(Arc::new(LoggingEventSink));
//!
//! let options = RunOptions::new("sample.svs").with_geojson();
//! let run = PipelineController::new(options, bus)?.run().await?;
//! println!("{}: {:?}", run.status, run.outcomes());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod runtime;
pub mod stage;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ModelResolution, RunOptions};
    pub use crate::core::{
        LogEvent, PipelineEvent, RunPhase, RunStatus, StageOutcome, StageResult, StatusEvent,
        StreamKind,
    };
    pub use crate::errors::{
        EnvironmentError, PipelineError, UsageError, WorkspaceError,
    };
    pub use crate::events::{
        CollectingEventSink, EventBus, EventBusConfig, EventSink, LoggingEventSink, NoOpEventSink,
        OverflowPolicy, Subscription,
    };
    pub use crate::pipeline::{PipelineController, PipelineRun, RunHandle};
    pub use crate::runtime::{EnvResolver, RuntimeEnvironment};
    pub use crate::stage::{build_stage_plan, StageRunner, StageSpec};
    pub use crate::workspace::{WorkspaceManager, WorkspacePaths};
}
