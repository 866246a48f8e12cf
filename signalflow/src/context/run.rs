//! Read-only context for one pipeline run.

use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::utils::{generate_run_id, now_utc, Timestamp};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Context handed to every stage handler of one run.
///
/// The context is immutable once the run starts and is shared by reference
/// across concurrently running stages, so it must not carry per-stage state.
#[derive(Clone)]
pub struct RunContext {
    run_id: Uuid,
    signal_id: Option<String>,
    is_demo: bool,
    scoring_time: Option<Timestamp>,
    metadata: HashMap<String, serde_json::Value>,
    event_sink: Arc<dyn EventSink>,
}

impl RunContext {
    /// Creates a context with a fresh run id and a no-op event sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: generate_run_id(),
            signal_id: None,
            is_demo: false,
            scoring_time: None,
            metadata: HashMap::new(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the signal this run processes.
    #[must_use]
    pub fn with_signal_id(mut self, signal_id: impl Into<String>) -> Self {
        self.signal_id = Some(signal_id.into());
        self
    }

    /// Marks the run as a demo run.
    #[must_use]
    pub fn with_demo(mut self, is_demo: bool) -> Self {
        self.is_demo = is_demo;
        self
    }

    /// Pins the timestamp used by time-decay computations.
    ///
    /// Replays set this to the stored scoring timestamp.
    #[must_use]
    pub fn with_scoring_time(mut self, scoring_time: Timestamp) -> Self {
        self.scoring_time = Some(scoring_time);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the signal id, if set.
    #[must_use]
    pub fn signal_id(&self) -> Option<&str> {
        self.signal_id.as_deref()
    }

    /// Returns true for demo runs.
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.is_demo
    }

    /// Returns the pinned scoring time, if any.
    #[must_use]
    pub fn scoring_time(&self) -> Option<Timestamp> {
        self.scoring_time
    }

    /// Returns the pinned scoring time, or the current time when unpinned.
    #[must_use]
    pub fn effective_scoring_time(&self) -> Timestamp {
        self.scoring_time.unwrap_or_else(now_utc)
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Emits an event to the attached sink.
    pub fn emit(&self, event: &PipelineEvent) {
        self.event_sink.try_emit(event);
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("signal_id", &self.signal_id)
            .field("is_demo", &self.is_demo)
            .field("scoring_time", &self.scoring_time)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
