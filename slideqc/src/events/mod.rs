//! Event bus and sink system for observability.
//!
//! The controller and stage runner publish [`crate::core::PipelineEvent`]s to
//! an [`EventBus`]; consumers either pull from a [`Subscription`] or attach an
//! [`EventSink`] that is driven on its own task.

mod bus;
mod sink;

pub use bus::{BusMetrics, EventBus, EventBusConfig, OverflowPolicy, Subscription};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
