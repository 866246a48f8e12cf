//! Error types for the signalflow engine.
//!
//! Graph and configuration errors fail before any work starts, stage errors
//! abort only the in-flight run, and provider errors never leave the node
//! that observed them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for signalflow operations.
#[derive(Debug, Error)]
pub enum SignalflowError {
    /// The stage graph definition is invalid.
    #[error("{0}")]
    GraphDefinition(#[from] GraphDefinitionError),

    /// A stage handler or fail-hard node returned an error.
    #[error(transparent)]
    StageExecution(#[from] StageExecutionError),

    /// A node/stage config is malformed or a collaborator is missing.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A pipeline state violated a hard structural invariant.
    #[error("{0}")]
    StateInvariant(#[from] StateInvariantError),

    /// The signal store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SignalflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "GRAPH-003-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = ContractSuggestions::get(&code).map(str::to_string);
        Self {
            code,
            summary: summary.into(),
            fix_hint,
            context: HashMap::new(),
        }
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// One problem found while validating a stage list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphIssue {
    /// Two stages share the same id.
    DuplicateStageId {
        /// The repeated id.
        id: String,
    },
    /// A `dependsOn` entry names a stage that was never declared.
    UnknownDependency {
        /// The declaring stage.
        stage: String,
        /// The unresolved id.
        dependency: String,
    },
    /// The dependency relation contains a cycle.
    Cycle {
        /// Stage ids along the cycle, first id repeated at the end.
        path: Vec<String>,
    },
    /// No stages were declared.
    Empty,
}

impl GraphIssue {
    /// Returns the contract code for this kind of issue.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateStageId { .. } => "GRAPH-001-DUPLICATE",
            Self::UnknownDependency { .. } => "GRAPH-002-UNKNOWN_DEP",
            Self::Cycle { .. } => "GRAPH-003-CYCLE",
            Self::Empty => "GRAPH-004-EMPTY",
        }
    }

    /// Returns the stage ids this issue refers to.
    #[must_use]
    pub fn stages(&self) -> Vec<String> {
        match self {
            Self::DuplicateStageId { id } => vec![id.clone()],
            Self::UnknownDependency { stage, dependency } => vec![stage.clone(), dependency.clone()],
            Self::Cycle { path } => path.clone(),
            Self::Empty => Vec::new(),
        }
    }
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateStageId { id } => write!(f, "duplicate stage id '{id}'"),
            Self::UnknownDependency { stage, dependency } => write!(
                f,
                "stage '{stage}' depends on unknown stage id '{dependency}'"
            ),
            Self::Cycle { path } => write!(f, "dependency cycle detected: {}", path.join(" -> ")),
            Self::Empty => write!(f, "pipeline has no stages"),
        }
    }
}

/// Error raised when a stage list fails validation.
///
/// Issues found in the same validation phase are aggregated, so a list with
/// three duplicate ids reports all three.
#[derive(Debug, Clone, Error)]
#[error("Graph definition error: {message}")]
pub struct GraphDefinitionError {
    /// Human-readable summary of every issue.
    pub message: String,
    /// The individual issues.
    pub issues: Vec<GraphIssue>,
    /// Contract info for the first issue.
    pub error_info: ContractErrorInfo,
}

impl GraphDefinitionError {
    /// Builds an error from a non-empty set of issues.
    #[must_use]
    pub fn from_issues(issues: Vec<GraphIssue>) -> Self {
        let message = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let error_info = issues.first().map_or_else(ContractErrorInfo::default, |first| {
            ContractErrorInfo::new(first.code(), first.to_string())
                .with_context_entry("stages", first.stages().join(","))
        });
        Self {
            message,
            issues,
            error_info,
        }
    }

    /// Returns every stage id mentioned by any issue.
    #[must_use]
    pub fn stages(&self) -> Vec<String> {
        self.issues.iter().flat_map(GraphIssue::stages).collect()
    }

    /// Returns true if a cycle was reported.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, GraphIssue::Cycle { .. }))
    }
}

/// Error raised when a stage handler or fail-hard node fails.
///
/// Displays exactly like the original handler error, which stays reachable
/// through [`StageExecutionError::source_error`] and [`StageExecutionError::into_source`].
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StageExecutionError {
    /// The stage or node that failed.
    pub stage_id: String,
    /// The error the handler returned.
    error: anyhow::Error,
}

impl StageExecutionError {
    /// Wraps a handler error.
    #[must_use]
    pub fn new(stage_id: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            stage_id: stage_id.into(),
            error,
        }
    }

    /// Borrows the original handler error.
    #[must_use]
    pub fn source_error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Returns the original handler error.
    #[must_use]
    pub fn into_source(self) -> anyhow::Error {
        self.error
    }
}

/// Error raised for malformed configuration or a missing collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Configuration error: {message}")]
pub struct ConfigurationError {
    /// The offending field, variable or collaborator name.
    pub field: String,
    /// The full message.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a configuration error for a field.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// A required field is missing or empty on a node.
    #[must_use]
    pub fn missing_field(owner: &str, field: &str) -> Self {
        Self::new(
            field,
            format!("node '{owner}' is missing required field '{field}'"),
        )
    }

    /// A field carries an unsupported value.
    #[must_use]
    pub fn invalid_value(owner: &str, field: &str, value: impl fmt::Display) -> Self {
        Self::new(
            field,
            format!("node '{owner}' has invalid value '{value}' for field '{field}'"),
        )
    }

    /// An external collaborator was never configured.
    #[must_use]
    pub fn missing_collaborator(name: &str) -> Self {
        Self::new(name, format!("required collaborator '{name}' is not configured"))
    }
}

/// A fail-soft provider could not be reached.
///
/// Always recovered at the node boundary and recorded as data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Provider '{provider}' unavailable: {reason}")]
pub struct ProviderUnavailableError {
    /// The provider name.
    pub provider: String,
    /// Why it was unavailable.
    pub reason: String,
}

impl ProviderUnavailableError {
    /// Creates a provider unavailable error.
    #[must_use]
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when a pipeline state breaks a hard invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("State invariant violated: {}", violations.join("; "))]
pub struct StateInvariantError {
    /// Every hard violation found.
    pub violations: Vec<String>,
}

/// Errors raised by signal stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be opened or reached.
    #[error("signal store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("stored snapshot is malformed: {0}")]
    Malformed(String),
}

/// Provides default suggestions for graph contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "GRAPH-001-DUPLICATE" => Some(
                "Every stage needs a unique id. Rename one of the stages sharing the id.",
            ),
            "GRAPH-002-UNKNOWN_DEP" => Some(
                "Ensure all dependsOn entries reference stages declared in the same pipeline. \
                 Check for typos in stage ids.",
            ),
            "GRAPH-003-CYCLE" => Some(
                "Remove one of the dependencies in the cycle to break it.",
            ),
            "GRAPH-004-EMPTY" => Some("Declare at least one stage before building the graph."),
            _ => None,
        }
    }
}
