//! Per-run workspace management.

mod manager;

pub use manager::{WorkspaceManager, WorkspacePaths, SLIDES_IN_DIR};
