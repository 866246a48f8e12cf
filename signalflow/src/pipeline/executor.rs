//! DAG executor.
//!
//! Executes stages as soon as their dependencies are met. Independent stages
//! run concurrently on the tokio runtime; the first failing stage aborts the
//! whole run.

use super::{HandlerRegistry, ResolvedHandlers, StageDefinition, StageGraph, StageHandler};
use crate::context::RunContext;
use crate::core::StageRunStatus;
use crate::errors::{ConfigurationError, SignalflowError, StageExecutionError};
use crate::events::PipelineEvent;
use crate::utils::{now_utc, Timestamp};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::AbortHandle;
use tracing::{debug, error, info};

/// Execution record for one started stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMeta {
    /// Stage id.
    pub id: String,
    /// The stage's dependencies at run time.
    pub depends_on: Vec<String>,
    /// Whether the handler succeeded.
    pub status: StageRunStatus,
    /// Handler wall time in milliseconds.
    pub duration_ms: f64,
    /// When the handler was invoked.
    pub started_at: Timestamp,
    /// When the handler returned.
    pub ended_at: Timestamp,
}

/// Result of a successful DAG run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DagRunOutput {
    /// The single sink's payload, or an object keyed by sink id.
    pub payload: Value,
    /// One entry per stage, in completion order.
    pub stage_meta: Vec<StageMeta>,
    /// Every stage's produced payload.
    pub intermediate_payloads: BTreeMap<String, Value>,
}

struct StageCompletion {
    stage_id: String,
    started_at: Timestamp,
    ended_at: Timestamp,
    duration_ms: f64,
    result: anyhow::Result<Value>,
}

/// Runs a validated stage graph with resolved handlers.
#[derive(Debug, Clone)]
pub struct DagExecutor {
    graph: Arc<StageGraph>,
    handlers: ResolvedHandlers,
    max_concurrency: Option<usize>,
}

impl DagExecutor {
    /// Creates an executor over a graph whose handlers are already resolved.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` naming the first stage of `graph` with
    /// no bound handler.
    pub fn new(graph: StageGraph, handlers: ResolvedHandlers) -> Result<Self, ConfigurationError> {
        if let Some(missing) = graph.stages().iter().find(|s| handlers.get(&s.id).is_none()) {
            return Err(ConfigurationError::new(
                missing.id.clone(),
                format!("no handler bound to stage '{}'", missing.id),
            ));
        }
        Ok(Self {
            graph: Arc::new(graph),
            handlers,
            max_concurrency: None,
        })
    }

    /// Resolves handlers for `graph` from a registry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if any stage has no matching handler or
    /// plugin.
    pub fn from_registry(
        graph: StageGraph,
        registry: &HandlerRegistry,
    ) -> Result<Self, ConfigurationError> {
        let handlers = registry.resolve(&graph)?;
        Self::new(graph, handlers)
    }

    /// Bounds the number of stages running at once. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    /// Sets or clears the concurrency bound.
    #[must_use]
    pub fn with_optional_max_concurrency(self, limit: Option<usize>) -> Self {
        match limit {
            Some(limit) => self.with_max_concurrency(limit),
            None => Self {
                max_concurrency: None,
                ..self
            },
        }
    }

    /// Returns the concurrency bound, if any.
    #[must_use]
    pub fn max_concurrency(&self) -> Option<usize> {
        self.max_concurrency
    }

    /// Returns the graph this executor runs.
    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Runs every stage once and returns the sink payload(s).
    ///
    /// # Errors
    ///
    /// Returns `SignalflowError::StageExecution` carrying the first handler
    /// error unmodified. Other in-flight stages are aborted and no partial
    /// result is returned.
    pub async fn run(
        &self,
        initial_payload: Value,
        ctx: &RunContext,
    ) -> Result<DagRunOutput, SignalflowError> {
        let run_start = Instant::now();
        let total = self.graph.len();
        let limit = self.max_concurrency.unwrap_or(usize::MAX);

        let mut remaining: HashMap<&str, usize> = self
            .graph
            .in_degree()
            .iter()
            .map(|(id, degree)| (id.as_str(), *degree))
            .collect();
        let mut ready: VecDeque<&str> = self.graph.roots().into_iter().collect();
        let mut outputs: BTreeMap<String, Value> = BTreeMap::new();
        let mut stage_meta: Vec<StageMeta> = Vec::with_capacity(total);
        let mut in_flight = FuturesUnordered::new();
        let mut abort_handles: HashMap<String, AbortHandle> = HashMap::new();

        debug!(
            run_id = %ctx.run_id(),
            stages = total,
            max_concurrency = ?self.max_concurrency,
            "Starting DAG run"
        );

        loop {
            while in_flight.len() < limit {
                let Some(stage_id) = ready.pop_front() else {
                    break;
                };
                let input = self.stage_input(stage_id, &initial_payload, &outputs);
                let handler = match self.handler(stage_id) {
                    Ok(handler) => handler,
                    Err(err) => {
                        abort_all(&mut abort_handles);
                        return Err(err);
                    }
                };

                ctx.emit(&PipelineEvent::StageStarted {
                    stage: stage_id.to_string(),
                });
                debug!(stage = stage_id, "Dispatching stage");

                let handle = spawn_stage(stage_id.to_string(), handler, input, ctx.clone());
                abort_handles.insert(stage_id.to_string(), handle.abort_handle());
                let id = stage_id.to_string();
                in_flight.push(async move { (id, handle.await) });
            }

            let Some((stage_id, joined)) = in_flight.next().await else {
                break;
            };
            abort_handles.remove(&stage_id);

            let completion = match joined {
                Ok(completion) => completion,
                Err(join_err) => StageCompletion {
                    stage_id: stage_id.clone(),
                    started_at: now_utc(),
                    ended_at: now_utc(),
                    duration_ms: 0.0,
                    result: Err(anyhow::anyhow!("stage task did not complete: {join_err}")),
                },
            };
            let StageCompletion {
                stage_id,
                started_at,
                ended_at,
                duration_ms,
                result,
            } = completion;
            let depends_on = self
                .graph
                .stage(&stage_id)
                .map(|s| s.depends_on.clone())
                .unwrap_or_default();

            match result {
                Ok(payload) => {
                    ctx.emit(&PipelineEvent::StageCompleted {
                        stage: stage_id.clone(),
                        duration_ms,
                    });
                    stage_meta.push(StageMeta {
                        id: stage_id.clone(),
                        depends_on,
                        status: StageRunStatus::Success,
                        duration_ms,
                        started_at,
                        ended_at,
                    });

                    for child in self.graph.dependents(&stage_id) {
                        if let Some(count) = remaining.get_mut(child.as_str()) {
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                ready.push_back(child.as_str());
                            }
                        }
                    }
                    outputs.insert(stage_id, payload);
                }
                Err(err) => {
                    abort_all(&mut abort_handles);
                    let message = err.to_string();
                    error!(stage = %stage_id, error = %message, duration_ms, "Stage failed");
                    ctx.emit(&PipelineEvent::StageFailed {
                        stage: stage_id.clone(),
                        error: message.clone(),
                        duration_ms,
                    });
                    ctx.emit(&PipelineEvent::RunFailed {
                        stage: Some(stage_id.clone()),
                        error: message,
                    });
                    return Err(StageExecutionError::new(stage_id, err).into());
                }
            }
        }

        if outputs.len() != total {
            let pending: Vec<&str> = remaining
                .iter()
                .filter(|(id, _)| !outputs.contains_key(**id))
                .map(|(id, _)| *id)
                .collect();
            return Err(SignalflowError::Internal(format!(
                "Deadlocked stage graph; remaining stages: {pending:?}"
            )));
        }

        let payload = self.collect_sinks(&outputs);
        let duration_ms = run_start.elapsed().as_secs_f64() * 1000.0;
        ctx.emit(&PipelineEvent::RunCompleted {
            stages: stage_meta.len(),
            duration_ms,
        });
        info!(
            run_id = %ctx.run_id(),
            stages = stage_meta.len(),
            duration_ms,
            "DAG run completed"
        );

        Ok(DagRunOutput {
            payload,
            stage_meta,
            intermediate_payloads: outputs,
        })
    }

    fn handler(&self, stage_id: &str) -> Result<Arc<dyn StageHandler>, SignalflowError> {
        self.handlers.get(stage_id).cloned().ok_or_else(|| {
            ConfigurationError::new(stage_id, format!("no handler bound to stage '{stage_id}'"))
                .into()
        })
    }

    fn stage_input(&self, stage_id: &str, initial: &Value, outputs: &BTreeMap<String, Value>) -> Value {
        let deps = self
            .graph
            .stage(stage_id)
            .map(|s| s.depends_on.as_slice())
            .unwrap_or_default();
        match deps {
            [] => initial.clone(),
            [parent] => outputs.get(parent).cloned().unwrap_or(Value::Null),
            parents => {
                let inputs: Map<String, Value> = parents
                    .iter()
                    .map(|p| (p.clone(), outputs.get(p).cloned().unwrap_or(Value::Null)))
                    .collect();
                json!({ "parents": parents, "inputs": inputs })
            }
        }
    }

    fn collect_sinks(&self, outputs: &BTreeMap<String, Value>) -> Value {
        match self.graph.sinks() {
            [only] => outputs.get(only).cloned().unwrap_or(Value::Null),
            sinks => Value::Object(
                sinks
                    .iter()
                    .map(|s| (s.clone(), outputs.get(s).cloned().unwrap_or(Value::Null)))
                    .collect(),
            ),
        }
    }
}

fn abort_all(handles: &mut HashMap<String, AbortHandle>) {
    for (_, handle) in handles.drain() {
        handle.abort();
    }
}

fn spawn_stage(
    stage_id: String,
    handler: Arc<dyn StageHandler>,
    input: Value,
    ctx: RunContext,
) -> tokio::task::JoinHandle<StageCompletion> {
    tokio::spawn(async move {
        let started_at = now_utc();
        let clock = Instant::now();
        let result = handler.invoke(input, &ctx).await;
        StageCompletion {
            stage_id,
            started_at,
            ended_at: now_utc(),
            duration_ms: clock.elapsed().as_secs_f64() * 1000.0,
            result,
        }
    })
}

/// Validates `stages`, resolves their handlers and runs them once.
///
/// # Errors
///
/// Returns a graph or configuration error before any stage runs, or the
/// first stage error.
pub async fn run_definitions(
    stages: Vec<StageDefinition>,
    initial_payload: Value,
    ctx: &RunContext,
    registry: &HandlerRegistry,
) -> Result<DagRunOutput, SignalflowError> {
    let graph = StageGraph::build(stages)?;
    let executor = DagExecutor::from_registry(graph, registry)?;
    executor.run(initial_payload, ctx).await
}
