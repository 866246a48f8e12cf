//! Execution trace entries.

use crate::core::{NodeType, TraceStatus};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// One record of a node execution attempt.
///
/// A `running` entry never has `end_time`; `completed` and `failed` entries
/// carry both `end_time` and `duration_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTraceEntry {
    /// The node that ran.
    pub node_id: String,
    /// The node's declared role.
    pub node_type: NodeType,
    /// When the node started.
    pub start_time: Timestamp,
    /// When the node finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Wall time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Entry status.
    pub status: TraceStatus,
    /// Error text for failed entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionTraceEntry {
    /// Creates a running entry starting now.
    #[must_use]
    pub fn running(node_id: impl Into<String>, node_type: NodeType) -> Self {
        Self::started_at(node_id, node_type, now_utc())
    }

    /// Creates a running entry with an explicit start time.
    #[must_use]
    pub fn started_at(node_id: impl Into<String>, node_type: NodeType, start: Timestamp) -> Self {
        Self {
            node_id: node_id.into(),
            node_type,
            start_time: start,
            end_time: None,
            duration_ms: None,
            status: TraceStatus::Running,
            error: None,
        }
    }

    /// Marks the entry completed at `end`.
    #[must_use]
    pub fn completed_at(mut self, end: Timestamp) -> Self {
        self.finish(end, TraceStatus::Completed);
        self
    }

    /// Marks the entry failed at `end` with an error message.
    #[must_use]
    pub fn failed_at(mut self, end: Timestamp, error: impl Into<String>) -> Self {
        self.finish(end, TraceStatus::Failed);
        self.error = Some(error.into());
        self
    }

    fn finish(&mut self, end: Timestamp, status: TraceStatus) {
        let elapsed = end.signed_duration_since(self.start_time);
        #[allow(clippy::cast_precision_loss)]
        let micros = elapsed.num_microseconds().unwrap_or(0).max(0) as f64;
        self.end_time = Some(end);
        self.duration_ms = Some(micros / 1000.0);
        self.status = status;
    }

    /// Returns true if the entry finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
