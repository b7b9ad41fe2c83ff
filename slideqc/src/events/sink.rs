//! Event sink trait and implementations.

use crate::core::{PipelineEvent, StreamKind};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// A consumer of pipeline events.
///
/// The controller is decoupled from any presentation layer: anything that can
/// accept an event (a terminal printer, a file writer, a UI bridge) implements
/// this trait and is attached to the [`crate::events::EventBus`].
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Accepts one event. Must not panic; errors are the sink's problem.
    async fn accept(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn accept(&self, _event: &PipelineEvent) {
        // Intentionally empty - discards all events
    }
}

/// An event sink that forwards events into the tracing framework.
///
/// Status events log at info level; stage output lines log at debug, except
/// stderr lines which log at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn accept(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Status(status) => {
                info!(
                    stage = status.stage.as_deref().unwrap_or("-"),
                    phase = ?status.phase,
                    output_dir = ?status.output_dir,
                    "{}",
                    status.message
                );
            }
            PipelineEvent::Log(log) => match log.stream {
                StreamKind::Stderr => {
                    warn!(stage = %log.stage, stream = %log.stream, "{}", log.text);
                }
                StreamKind::Stdout => {
                    debug!(stage = %log.stage, stream = %log.stream, "{}", log.text);
                }
            },
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns only the status events, in arrival order.
    #[must_use]
    pub fn statuses(&self) -> Vec<crate::core::StatusEvent> {
        self.events
            .read()
            .iter()
            .filter_map(|e| e.as_status().cloned())
            .collect()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn accept(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}
