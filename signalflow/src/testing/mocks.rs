//! Mock handlers, nodes, providers and pipelines for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::context::RunContext;
use crate::core::NodeOutcome;
use crate::pipeline::StageHandler;
use crate::replay::{PipelineEntry, PipelineOutcome, RunOptions};
use crate::state::{NodeConfig, PipelineNode, PipelineState, PredictionProvider};

/// A handler that records every payload it receives.
///
/// Returns the configured output, or echoes the input when none is set.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    output: Mutex<Option<Value>>,
    inputs: Mutex<Vec<Value>>,
}

impl RecordingHandler {
    /// Creates an echoing recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder returning a fixed output.
    #[must_use]
    pub fn returning(output: Value) -> Self {
        Self {
            output: Mutex::new(Some(output)),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns every received payload.
    #[must_use]
    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl StageHandler for RecordingHandler {
    async fn invoke(&self, payload: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        self.inputs.lock().push(payload.clone());
        Ok(self.output.lock().clone().unwrap_or(payload))
    }
}

/// A handler that always fails with a fixed message.
#[derive(Debug)]
pub struct FailingHandler {
    error: String,
}

impl FailingHandler {
    /// Creates a failing handler.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl StageHandler for FailingHandler {
    async fn invoke(&self, _payload: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("{}", self.error))
    }
}

/// A handler that sleeps before echoing its input.
#[derive(Debug)]
pub struct SlowHandler {
    delay: Duration,
}

impl SlowHandler {
    /// Creates a slow handler.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a slow handler with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl StageHandler for SlowHandler {
    async fn invoke(&self, payload: Value, _ctx: &RunContext) -> anyhow::Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(payload)
    }
}

/// A node that stores a fixed value under its id and counts calls.
#[derive(Debug)]
pub struct MockNode {
    value: Value,
    calls: Mutex<usize>,
}

impl MockNode {
    /// Creates a mock node.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl PipelineNode for MockNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        state: &mut PipelineState,
        _ctx: &RunContext,
    ) -> NodeOutcome {
        *self.calls.lock() += 1;
        state.set_result(config.id.clone(), self.value.clone());
        NodeOutcome::CompletedAvailable
    }
}

/// A fail-hard node that always fails.
#[derive(Debug)]
pub struct FailingNode {
    error: String,
}

impl FailingNode {
    /// Creates a failing node.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl PipelineNode for FailingNode {
    async fn execute(
        &self,
        _config: &NodeConfig,
        _state: &mut PipelineState,
        _ctx: &RunContext,
    ) -> NodeOutcome {
        NodeOutcome::Failed(anyhow::anyhow!("{}", self.error))
    }
}

/// A provider that always answers with a fixed prediction.
#[derive(Debug)]
pub struct StaticProvider {
    name: String,
    prediction: Value,
}

impl StaticProvider {
    /// Creates a static provider.
    #[must_use]
    pub fn new(name: impl Into<String>, prediction: Value) -> Self {
        Self {
            name: name.into(),
            prediction,
        }
    }
}

#[async_trait]
impl PredictionProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn predict(&self, _input: &Value) -> anyhow::Result<Value> {
        Ok(self.prediction.clone())
    }
}

/// A provider that is never available.
#[derive(Debug)]
pub struct UnavailableProvider {
    name: String,
}

impl UnavailableProvider {
    /// Creates an unavailable provider.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl PredictionProvider for UnavailableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn predict(&self, _input: &Value) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("{} is offline", self.name))
    }
}

/// A pipeline re-entry point returning a fixed outcome.
///
/// Records the input and options of every run.
#[derive(Debug)]
pub struct StaticPipeline {
    outcome: Result<PipelineOutcome, String>,
    runs: Mutex<Vec<(Value, RunOptions)>>,
}

impl StaticPipeline {
    /// Creates a pipeline that always returns `outcome`.
    #[must_use]
    pub fn new(outcome: PipelineOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(outcome),
            runs: Mutex::new(Vec::new()),
        })
    }

    /// Creates a pipeline that always fails.
    #[must_use]
    pub fn failing(error: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error.into()),
            runs: Mutex::new(Vec::new()),
        })
    }

    /// Returns the recorded runs.
    #[must_use]
    pub fn runs(&self) -> Vec<(Value, RunOptions)> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl PipelineEntry for StaticPipeline {
    async fn run(&self, input: Value, options: RunOptions) -> anyhow::Result<PipelineOutcome> {
        self.runs.lock().push((input, options));
        self.outcome.clone().map_err(|e| anyhow::anyhow!(e))
    }
}
