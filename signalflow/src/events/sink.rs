//! Event sink trait and implementations.

use super::PipelineEvent;
use tracing::{debug, info, Level};

/// Receives lifecycle events from executor and node runs.
///
/// Implementations must never fail; a sink that cannot deliver an event
/// drops it.
pub trait EventSink: Send + Sync {
    /// Emits an event without blocking.
    fn try_emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        let data = event.to_json();
        if self.level == Level::DEBUG {
            debug!(event_type, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type, event_data = %data, "Event: {}", event_type);
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

    /// Returns the event types matching a prefix, in emission order.
    #[must_use]
    pub fn types_with_prefix(&self, type_prefix: &str) -> Vec<&'static str> {
        self.events
            .read()
            .iter()
            .map(PipelineEvent::event_type)
            .filter(|t| t.starts_with(type_prefix))
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}
