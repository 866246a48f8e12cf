//! Stage and node status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which backend serves a stage's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// An in-process handler registered under the stage id.
    #[default]
    Internal,
    /// An external plugin module registered under a plugin name.
    Plugin,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

/// Outcome of one stage at the DAG executor layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRunStatus {
    /// The handler returned a payload.
    Success,
    /// The handler returned an error.
    Failed,
}

impl fmt::Display for StageRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The role a node plays in per-signal enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Must succeed for the signal to be scored.
    Required,
    /// Adds enrichment data.
    Enrichment,
    /// Normalises the inbound signal.
    Ingress,
}

impl NodeType {
    /// Parses a node type tag.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "required" => Some(Self::Required),
            "enrichment" => Some(Self::Enrichment),
            "ingress" => Some(Self::Ingress),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Enrichment => write!(f, "enrichment"),
            Self::Ingress => write!(f, "ingress"),
        }
    }
}

/// Status of one trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Not yet started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished, including fail-soft completions.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TraceStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result tag a node reports back to the runner.
///
/// Only [`NodeOutcome::Failed`] aborts a run.
#[derive(Debug)]
pub enum NodeOutcome {
    /// The node ran and its backing service (if any) answered.
    CompletedAvailable,
    /// The node ran but its provider was unreachable; recorded as data.
    CompletedUnavailable {
        /// Why the provider was unavailable.
        reason: String,
    },
    /// The node failed.
    Failed(anyhow::Error),
}

impl NodeOutcome {
    /// Returns the trace status this outcome produces.
    #[must_use]
    pub fn trace_status(&self) -> TraceStatus {
        match self {
            Self::CompletedAvailable | Self::CompletedUnavailable { .. } => TraceStatus::Completed,
            Self::Failed(_) => TraceStatus::Failed,
        }
    }

    /// Returns true unless the outcome is a failure.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl From<anyhow::Result<()>> for NodeOutcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::CompletedAvailable,
            Err(err) => Self::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_serialize() {
        let json = serde_json::to_string(&StageKind::Plugin).unwrap();
        assert_eq!(json, r#""plugin""#);
        let kind: StageKind = serde_json::from_str(r#""internal""#).unwrap();
        assert_eq!(kind, StageKind::Internal);
    }

    #[test]
    fn test_node_type_parse() {
        assert_eq!(NodeType::parse("ingress"), Some(NodeType::Ingress));
        assert_eq!(NodeType::parse("enrichment"), Some(NodeType::Enrichment));
        assert_eq!(NodeType::parse("optional"), None);
        assert_eq!(NodeType::Required.to_string(), "required");
    }

    #[test]
    fn test_trace_status_is_terminal() {
        assert!(TraceStatus::Completed.is_terminal());
        assert!(TraceStatus::Failed.is_terminal());
        assert!(!TraceStatus::Running.is_terminal());
        assert!(!TraceStatus::Pending.is_terminal());
    }

    #[test]
    fn test_node_outcome_trace_status() {
        let soft = NodeOutcome::CompletedUnavailable {
            reason: "timeout".into(),
        };
        assert_eq!(soft.trace_status(), TraceStatus::Completed);
        assert!(soft.is_completed());

        let hard = NodeOutcome::from(Err::<(), _>(anyhow::anyhow!("bad")));
        assert_eq!(hard.trace_status(), TraceStatus::Failed);
        assert!(!hard.is_completed());
    }
}
