//! Pipeline re-entry over a DAG executor.

use super::{PipelineEntry, PipelineOutcome, RunOptions, ScoredResult};
use crate::context::RunContext;
use crate::events::{EventSink, NoOpEventSink};
use crate::pipeline::DagExecutor;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Runs a [`DagExecutor`] and decodes its final payload as a scored result.
///
/// The sink payload must deserialize into [`ScoredResult`].
#[derive(Clone)]
pub struct DagPipeline {
    executor: DagExecutor,
    event_sink: Arc<dyn EventSink>,
}

impl DagPipeline {
    /// Wraps an executor.
    #[must_use]
    pub fn new(executor: DagExecutor) -> Self {
        Self {
            executor,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink attached to every run.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    fn context(&self, options: &RunOptions) -> RunContext {
        let mut ctx = RunContext::new()
            .with_demo(options.is_demo)
            .with_event_sink(self.event_sink.clone())
            .with_metadata(
                "includeStageSummaries",
                Value::Bool(options.include_stage_summaries),
            );
        if let Some(signal_id) = &options.signal_id {
            ctx = ctx.with_signal_id(signal_id.clone());
        }
        if let Some(scoring_time) = options.scoring_time {
            ctx = ctx.with_scoring_time(scoring_time);
        }
        ctx
    }
}

impl std::fmt::Debug for DagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagPipeline")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PipelineEntry for DagPipeline {
    async fn run(&self, input: Value, options: RunOptions) -> anyhow::Result<PipelineOutcome> {
        let ctx = self.context(&options);
        let output = self.executor.run(input, &ctx).await?;
        let result: ScoredResult = serde_json::from_value(output.payload)?;
        Ok(PipelineOutcome {
            result,
            stage_summaries: options.include_stage_summaries.then_some(output.stage_meta),
        })
    }
}
