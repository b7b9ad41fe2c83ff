//! Pipeline run record and controller.

mod controller;
mod run;

#[cfg(test)]
mod integration_tests;

pub use controller::{PipelineController, RunHandle};
pub use run::PipelineRun;
