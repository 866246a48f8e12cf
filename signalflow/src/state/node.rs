//! Node configuration and the node contract.

use super::PipelineState;
use crate::context::RunContext;
use crate::core::{NodeOutcome, NodeType};
use crate::errors::ConfigurationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A node as declared in a pipeline state.
///
/// `type` and `enabled` are kept loose here so that malformed configs can be
/// carried into state and rejected by [`NodeConfig::validate`] with a
/// message naming the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Unique node id.
    #[serde(default)]
    pub id: String,
    /// Node role tag: `required`, `enrichment` or `ingress`.
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Name of the node implementation in the [`super::NodeRegistry`].
    #[serde(default)]
    pub plugin: String,
    /// Advisory flag; the runner executes nodes one at a time.
    #[serde(default)]
    pub parallel: bool,
    /// Whether the node runs at all. Must be present.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Ids of nodes that must complete first.
    #[serde(default, alias = "dependsOn")]
    pub dependencies: Vec<String>,
}

impl NodeConfig {
    /// Creates an enabled node config.
    #[must_use]
    pub fn new(id: impl Into<String>, node_type: NodeType, plugin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.to_string(),
            plugin: plugin.into(),
            parallel: false,
            enabled: Some(true),
            dependencies: Vec::new(),
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets the advisory parallel flag.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns true if the node is enabled. Unvalidated configs count as disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Checks the config and returns its parsed node type.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` naming the field for an empty `id`, an
    /// unknown `type`, an empty `plugin` or a missing `enabled` flag.
    pub fn validate(&self) -> Result<NodeType, ConfigurationError> {
        if self.id.trim().is_empty() {
            return Err(ConfigurationError::missing_field("<unnamed>", "id"));
        }
        let owner = self.id.as_str();
        let node_type = NodeType::parse(&self.node_type)
            .ok_or_else(|| ConfigurationError::invalid_value(owner, "type", &self.node_type))?;
        if self.plugin.trim().is_empty() {
            return Err(ConfigurationError::missing_field(owner, "plugin"));
        }
        if self.enabled.is_none() {
            return Err(ConfigurationError::missing_field(owner, "enabled"));
        }
        Ok(node_type)
    }
}

/// A unit of work at the per-signal composition layer.
///
/// Nodes mutate the state they are given and report an explicit outcome.
/// Returning [`NodeOutcome::Failed`] aborts the run; nodes backed by an
/// external provider report [`NodeOutcome::CompletedUnavailable`] instead.
#[async_trait]
pub trait PipelineNode: Send + Sync + Debug {
    /// Runs the node against the state.
    async fn execute(
        &self,
        config: &NodeConfig,
        state: &mut PipelineState,
        ctx: &RunContext,
    ) -> NodeOutcome;
}
