//! Sequential node runner with per-node fail-hard/fail-soft handling.

use super::{ExecutionTraceEntry, NodeConfig, NodeRegistry, PipelineNode, PipelineState};
use crate::context::RunContext;
use crate::core::{NodeOutcome, NodeType};
use crate::errors::{ConfigurationError, SignalflowError, StageExecutionError};
use crate::events::PipelineEvent;
use crate::observability::SpanTimer;
use crate::pipeline::{find_cycle, stable_topological_sort};
use crate::utils::now_utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened in one node run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunSummary {
    /// Node ids in execution order.
    pub executed: Vec<String>,
    /// Nodes that completed without their provider.
    pub unavailable: Vec<String>,
    /// Disabled nodes that were skipped.
    pub skipped: Vec<String>,
}

/// Returns the execution order of the enabled nodes.
///
/// Each node follows all of its dependencies; nodes with no mutual
/// dependency keep declaration order. Dependencies on disabled nodes are
/// treated as satisfied.
///
/// # Errors
///
/// Returns `ConfigurationError` if a dependency names an undeclared node or
/// the dependencies form a cycle ("Circular dependency detected: ...").
pub fn execution_order(configs: &[NodeConfig]) -> Result<Vec<String>, ConfigurationError> {
    let declared: HashSet<&str> = configs.iter().map(|c| c.id.as_str()).collect();
    for config in configs {
        if let Some(unknown) = config
            .dependencies
            .iter()
            .find(|dep| !declared.contains(dep.as_str()))
        {
            return Err(ConfigurationError::new(
                "dependencies",
                format!("node '{}' depends on unknown node '{unknown}'", config.id),
            ));
        }
    }

    let nodes: Vec<(String, Vec<String>)> = configs
        .iter()
        .filter(|c| c.is_enabled())
        .map(|c| (c.id.clone(), c.dependencies.clone()))
        .collect();
    stable_topological_sort(&nodes).map_err(|remaining| {
        let path = find_cycle(&nodes, &remaining).unwrap_or(remaining);
        ConfigurationError::new(
            "dependencies",
            format!("Circular dependency detected: {}", path.join(" -> ")),
        )
    })
}

/// Runs the nodes declared in a [`PipelineState`] against that state.
#[derive(Debug, Clone)]
pub struct NodeRunner {
    registry: NodeRegistry,
}

impl NodeRunner {
    /// Creates a runner over an explicit registry.
    #[must_use]
    pub fn new(registry: NodeRegistry) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Validates every node config, orders the enabled nodes and runs them
    /// one at a time.
    ///
    /// Every node's config is checked before the first node runs. A node
    /// reporting [`NodeOutcome::Failed`] gets a `failed` trace entry and
    /// aborts the run; [`NodeOutcome::CompletedUnavailable`] gets a
    /// `completed` entry and the run continues.
    ///
    /// # Errors
    ///
    /// Returns `SignalflowError::Configuration` for invalid configs, unknown
    /// plugins or dependency cycles, and `SignalflowError::StageExecution`
    /// carrying the failing node's error.
    pub async fn run(
        &self,
        state: &mut PipelineState,
        ctx: &RunContext,
    ) -> Result<NodeRunSummary, SignalflowError> {
        let plan = self.plan(&state.node_configs)?;
        let mut summary = NodeRunSummary {
            skipped: state
                .node_configs
                .iter()
                .filter(|c| !c.is_enabled())
                .map(|c| c.id.clone())
                .collect(),
            ..NodeRunSummary::default()
        };

        debug!(
            signal_id = %state.signal_id,
            nodes = plan.len(),
            skipped = summary.skipped.len(),
            "Running pipeline nodes"
        );

        for (config, node_type, node) in plan {
            state.current_node = Some(config.id.clone());
            let entry = ExecutionTraceEntry::running(config.id.clone(), node_type);
            let timer = SpanTimer::start(config.id.clone());

            let outcome = node.execute(&config, state, ctx).await;
            let duration_ms = timer.finish();

            match outcome {
                NodeOutcome::CompletedAvailable => {
                    state.push_trace(entry.completed_at(now_utc()));
                    ctx.emit(&PipelineEvent::NodeCompleted {
                        node: config.id.clone(),
                        service_available: true,
                        duration_ms,
                    });
                }
                NodeOutcome::CompletedUnavailable { reason } => {
                    warn!(node = %config.id, %reason, "Node completed without its provider");
                    state.push_trace(entry.completed_at(now_utc()));
                    ctx.emit(&PipelineEvent::NodeCompleted {
                        node: config.id.clone(),
                        service_available: false,
                        duration_ms,
                    });
                    summary.unavailable.push(config.id.clone());
                }
                NodeOutcome::Failed(err) => {
                    let message = err.to_string();
                    error!(node = %config.id, error = %message, "Node failed");
                    state.push_trace(entry.failed_at(now_utc(), message.clone()));
                    state.current_node = None;
                    ctx.emit(&PipelineEvent::NodeFailed {
                        node: config.id.clone(),
                        error: message,
                    });
                    return Err(StageExecutionError::new(config.id, err).into());
                }
            }
            summary.executed.push(config.id);
        }

        state.current_node = None;
        info!(
            signal_id = %state.signal_id,
            executed = summary.executed.len(),
            unavailable = summary.unavailable.len(),
            "Pipeline nodes completed"
        );
        Ok(summary)
    }

    fn plan(
        &self,
        configs: &[NodeConfig],
    ) -> Result<Vec<(NodeConfig, NodeType, Arc<dyn PipelineNode>)>, ConfigurationError> {
        let mut seen = HashSet::new();
        let mut types = Vec::with_capacity(configs.len());
        for config in configs {
            let node_type = config.validate()?;
            if !seen.insert(config.id.as_str()) {
                return Err(ConfigurationError::invalid_value(&config.id, "id", "duplicate"));
            }
            types.push(node_type);
        }

        let order = execution_order(configs)?;
        order
            .iter()
            .filter_map(|id| configs.iter().zip(&types).find(|(c, _)| &c.id == id))
            .map(|(config, node_type)| {
                let node = self.registry.get(&config.plugin).cloned().ok_or_else(|| {
                    ConfigurationError::new(
                        config.plugin.clone(),
                        format!(
                            "node '{}' uses plugin '{}' which is not registered",
                            config.id, config.plugin
                        ),
                    )
                })?;
                Ok((config.clone(), *node_type, node))
            })
            .collect()
    }
}
