//! Stage specifications.

use std::time::Duration;

/// Specification for one external pipeline stage.
///
/// Defined at configuration time, read-only during execution. Position in the
/// plan is the position in the stage list.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique stage name.
    pub name: String,
    /// Script file name, resolved against the runtime's scripts directory.
    pub script: String,
    /// Stage-specific arguments appended after the common contract flags.
    pub extra_args: Vec<String>,
    /// Whether a failure of this stage is fatal to the run.
    pub required: bool,
    /// Optional per-stage timeout.
    pub timeout: Option<Duration>,
}

impl StageSpec {
    /// Creates a required stage.
    #[must_use]
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            extra_args: Vec::new(),
            required: true,
            timeout: None,
        }
    }

    /// Marks the stage as optional: its failure downgrades the run to
    /// completed-with-warnings instead of failing it.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Appends a stage-specific argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Appends several stage-specific arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_spec_defaults() {
        let spec = StageSpec::new("qc", "wsi_process.py");
        assert!(spec.required);
        assert!(spec.extra_args.is_empty());
        assert!(spec.timeout.is_none());
    }

    #[test]
    fn test_stage_spec_builders() {
        let spec = StageSpec::new("qc", "wsi_process.py")
            .optional()
            .with_args(["--mpp", "1.0"])
            .with_arg("--geojson")
            .with_timeout(Duration::from_secs(60));

        assert!(!spec.required);
        assert_eq!(spec.extra_args, vec!["--mpp", "1.0", "--geojson"]);
        assert_eq!(spec.timeout, Some(Duration::from_secs(60)));
    }
}
