//! Pipeline event types published to the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which output stream of a stage process a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// The lifecycle phase a status event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// The run has been accepted and is starting.
    RunStarted,
    /// A stage process is about to launch.
    StageStarted,
    /// A stage finished with an outcome (or was skipped).
    StageFinished,
    /// The run reached a terminal state.
    RunFinished,
}

/// A single line of stage process output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// The stage that produced the line.
    pub stage: String,
    /// Which stream the line was read from.
    pub stream: StreamKind,
    /// The line text, without the trailing newline.
    pub text: String,
    /// When the line was read from the stream.
    pub timestamp: DateTime<Utc>,
}

/// A controller lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    /// The stage the event concerns, if any.
    pub stage: Option<String>,
    /// The lifecycle phase.
    pub phase: RunPhase,
    /// Human-readable description.
    pub message: String,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// The run's output directory, carried on the terminal event of a
    /// successful run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

/// An event published by the orchestrator.
///
/// Events are transient: the orchestrator does not persist them, but any
/// subscriber may.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A line of stage output.
    Log(LogEvent),
    /// A lifecycle transition.
    Status(StatusEvent),
}

impl PipelineEvent {
    /// Creates a log event timestamped at the point of the call.
    #[must_use]
    pub fn log(stage: impl Into<String>, stream: StreamKind, text: impl Into<String>) -> Self {
        Self::Log(LogEvent {
            stage: stage.into(),
            stream,
            text: text.into(),
            timestamp: Utc::now(),
        })
    }

    /// Creates a status event with no output directory.
    #[must_use]
    pub fn status(stage: Option<&str>, phase: RunPhase, message: impl Into<String>) -> Self {
        Self::Status(StatusEvent {
            stage: stage.map(String::from),
            phase,
            message: message.into(),
            timestamp: Utc::now(),
            output_dir: None,
        })
    }

    /// Creates a terminal status event carrying the run's output directory.
    #[must_use]
    pub fn terminal(message: impl Into<String>, output_dir: Option<PathBuf>) -> Self {
        Self::Status(StatusEvent {
            stage: None,
            phase: RunPhase::RunFinished,
            message: message.into(),
            timestamp: Utc::now(),
            output_dir,
        })
    }

    /// Returns the status payload if this is a status event.
    #[must_use]
    pub fn as_status(&self) -> Option<&StatusEvent> {
        match self {
            Self::Status(status) => Some(status),
            Self::Log(_) => None,
        }
    }

    /// Returns the log payload if this is a log event.
    #[must_use]
    pub fn as_log(&self) -> Option<&LogEvent> {
        match self {
            Self::Log(log) => Some(log),
            Self::Status(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_construction() {
        let event = PipelineEvent::log("qc", StreamKind::Stderr, "CUDA not available");
        let log = event.as_log().unwrap();
        assert_eq!(log.stage, "qc");
        assert_eq!(log.stream, StreamKind::Stderr);
        assert_eq!(log.text, "CUDA not available");
        assert!(event.as_status().is_none());
    }

    #[test]
    fn test_status_event_construction() {
        let event = PipelineEvent::status(Some("tissue_detect"), RunPhase::StageStarted, "starting");
        let status = event.as_status().unwrap();
        assert_eq!(status.stage.as_deref(), Some("tissue_detect"));
        assert_eq!(status.phase, RunPhase::StageStarted);
        assert!(status.output_dir.is_none());
    }

    #[test]
    fn test_terminal_event_carries_output_dir() {
        let event = PipelineEvent::terminal("completed", Some(PathBuf::from("/tmp/run_1")));
        let status = event.as_status().unwrap();
        assert_eq!(status.phase, RunPhase::RunFinished);
        assert_eq!(status.output_dir.as_deref(), Some(std::path::Path::new("/tmp/run_1")));
    }

    #[test]
    fn test_event_serialize_tagged() {
        let event = PipelineEvent::log("qc", StreamKind::Stdout, "tile 14/300");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log");
        assert_eq!(json["stream"], "stdout");

        let event = PipelineEvent::status(None, RunPhase::RunStarted, "run accepted");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["phase"], "run_started");
    }
}
