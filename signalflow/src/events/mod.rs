//! Lifecycle events for observability.
//!
//! Sinks are attached per run through [`crate::context::RunContext`]; there
//! is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde_json::json;

/// A lifecycle event emitted by the executor or the node runner.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A stage was dispatched.
    StageStarted {
        /// Stage id.
        stage: String,
    },
    /// A stage handler returned a payload.
    StageCompleted {
        /// Stage id.
        stage: String,
        /// Handler wall time.
        duration_ms: f64,
    },
    /// A stage handler returned an error.
    StageFailed {
        /// Stage id.
        stage: String,
        /// Error text.
        error: String,
        /// Handler wall time.
        duration_ms: f64,
    },
    /// A node finished, possibly fail-soft.
    NodeCompleted {
        /// Node id.
        node: String,
        /// Whether the backing provider answered.
        service_available: bool,
        /// Node wall time.
        duration_ms: f64,
    },
    /// A fail-hard node failed.
    NodeFailed {
        /// Node id.
        node: String,
        /// Error text.
        error: String,
    },
    /// Every stage completed.
    RunCompleted {
        /// Number of stages executed.
        stages: usize,
        /// Total wall time.
        duration_ms: f64,
    },
    /// The run aborted.
    RunFailed {
        /// The failing stage, when known.
        stage: Option<String>,
        /// Error text.
        error: String,
    },
}

impl PipelineEvent {
    /// Returns the dotted event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::NodeCompleted { .. } => "node.completed",
            Self::NodeFailed { .. } => "node.failed",
            Self::RunCompleted { .. } => "pipeline.completed",
            Self::RunFailed { .. } => "pipeline.failed",
        }
    }

    /// Returns the event payload as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::StageStarted { stage } => json!({ "stage": stage }),
            Self::StageCompleted { stage, duration_ms } => {
                json!({ "stage": stage, "duration_ms": duration_ms })
            }
            Self::StageFailed {
                stage,
                error,
                duration_ms,
            } => json!({ "stage": stage, "error": error, "duration_ms": duration_ms }),
            Self::NodeCompleted {
                node,
                service_available,
                duration_ms,
            } => json!({
                "node": node,
                "service_available": service_available,
                "duration_ms": duration_ms,
            }),
            Self::NodeFailed { node, error } => json!({ "node": node, "error": error }),
            Self::RunCompleted {
                stages,
                duration_ms,
            } => json!({ "stages": stages, "duration_ms": duration_ms }),
            Self::RunFailed { stage, error } => json!({ "stage": stage, "error": error }),
        }
    }
}
