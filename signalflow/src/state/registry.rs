//! Node registry and closure-backed nodes.

use super::{NodeConfig, PipelineNode, PipelineState};
use crate::context::RunContext;
use crate::core::NodeOutcome;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Explicitly constructed map from plugin name to node implementation.
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn PipelineNode>>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node under a plugin name, replacing any previous one.
    pub fn register(&mut self, plugin: impl Into<String>, node: Arc<dyn PipelineNode>) {
        self.nodes.insert(plugin.into(), node);
    }

    /// Builder form of [`NodeRegistry::register`].
    #[must_use]
    pub fn with_node(mut self, plugin: impl Into<String>, node: Arc<dyn PipelineNode>) -> Self {
        self.register(plugin, node);
        self
    }

    /// Looks up a node by plugin name.
    #[must_use]
    pub fn get(&self, plugin: &str) -> Option<&Arc<dyn PipelineNode>> {
        self.nodes.get(plugin)
    }

    /// Returns true if the plugin is registered.
    #[must_use]
    pub fn contains(&self, plugin: &str) -> bool {
        self.nodes.contains_key(plugin)
    }

    /// Returns the number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A fail-hard node computed by a closure.
///
/// The closure's value is stored under the node id.
pub struct FnNode<F>
where
    F: Fn(&PipelineState) -> anyhow::Result<Value> + Send + Sync,
{
    func: F,
}

impl<F> FnNode<F>
where
    F: Fn(&PipelineState) -> anyhow::Result<Value> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnNode<F>
where
    F: Fn(&PipelineState) -> anyhow::Result<Value> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnNode").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> PipelineNode for FnNode<F>
where
    F: Fn(&PipelineState) -> anyhow::Result<Value> + Send + Sync,
{
    async fn execute(
        &self,
        config: &NodeConfig,
        state: &mut PipelineState,
        _ctx: &RunContext,
    ) -> NodeOutcome {
        match (self.func)(state) {
            Ok(value) => {
                state.set_result(config.id.clone(), value);
                NodeOutcome::CompletedAvailable
            }
            Err(err) => NodeOutcome::Failed(err),
        }
    }
}
