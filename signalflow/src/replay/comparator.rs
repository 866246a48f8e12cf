//! The replay comparator.

use super::{
    compare_results, reconstruct_input, Comparison, PipelineOutcome, ScoredResult, SignalStore,
    DEFAULT_SCORE_EPSILON,
};
use crate::errors::{ConfigurationError, SignalflowError, StageExecutionError, StoreError};
use crate::pipeline::StageMeta;
use crate::utils::{now_utc, Timestamp};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{info, warn};

/// Options passed to the pipeline on re-entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Attach per-stage summaries to the outcome.
    pub include_stage_summaries: bool,
    /// Run in demo mode.
    pub is_demo: bool,
    /// The signal being replayed.
    pub signal_id: Option<String>,
    /// Time to use for time-decay computations instead of now.
    pub scoring_time: Option<Timestamp>,
}

/// Pipeline re-entry point used by replays.
#[async_trait]
pub trait PipelineEntry: Send + Sync + Debug {
    /// Runs the pipeline on an input and returns the live result shape.
    async fn run(&self, input: Value, options: RunOptions) -> anyhow::Result<PipelineOutcome>;
}

/// Metadata about one replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMeta {
    /// When the replay ran.
    pub ran_at: Timestamp,
    /// Version of the pipeline that recomputed the result.
    pub pipeline_version: String,
    /// Whether the input had to be rebuilt.
    pub lossy_input: bool,
    /// Notes about input reconstruction.
    pub notes: Vec<String>,
}

/// A completed replay. Never written back to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    /// The replayed signal.
    pub signal_id: String,
    /// The stored side.
    pub stored: ScoredResult,
    /// The recomputed side.
    pub recomputed: ScoredResult,
    /// The diff.
    pub comparison: Comparison,
    /// Replay metadata.
    pub replay_meta: ReplayMeta,
    /// Per-stage summaries of the recomputation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_summaries: Option<Vec<StageMeta>>,
}

/// Either a replay or an explicit "nothing to replay".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplayOutcome {
    /// The signal was found and replayed.
    Replayed(Box<ReplayResult>),
    /// No snapshot exists for the signal.
    NotFound {
        /// The requested signal id.
        #[serde(rename = "signalId")]
        signal_id: String,
    },
}

impl ReplayOutcome {
    /// Returns the replay result, if any.
    #[must_use]
    pub fn result(&self) -> Option<&ReplayResult> {
        match self {
            Self::Replayed(result) => Some(result),
            Self::NotFound { .. } => None,
        }
    }

    /// Returns true for the not-found outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Re-runs stored signals and diffs the results.
///
/// Holds only a read contract to the store.
#[derive(Clone)]
pub struct ReplayComparator {
    store: Option<Arc<dyn SignalStore>>,
    pipeline: Arc<dyn PipelineEntry>,
    epsilon: f64,
    pipeline_version: String,
    include_stage_summaries: bool,
}

impl ReplayComparator {
    /// Creates a comparator with no store attached.
    #[must_use]
    pub fn new(pipeline: Arc<dyn PipelineEntry>) -> Self {
        Self {
            store: None,
            pipeline,
            epsilon: DEFAULT_SCORE_EPSILON,
            pipeline_version: env!("CARGO_PKG_VERSION").to_string(),
            include_stage_summaries: false,
        }
    }

    /// Attaches the signal store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SignalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the numeric tolerance.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the version reported in replay metadata.
    #[must_use]
    pub fn with_pipeline_version(mut self, version: impl Into<String>) -> Self {
        self.pipeline_version = version.into();
        self
    }

    /// Requests per-stage summaries from the pipeline.
    #[must_use]
    pub fn with_stage_summaries(mut self, include: bool) -> Self {
        self.include_stage_summaries = include;
        self
    }

    /// Replays one signal.
    ///
    /// # Errors
    ///
    /// Returns `SignalflowError::Configuration` if no store is attached or
    /// the store is unavailable, `SignalflowError::Store` for other store
    /// failures, and any error the pipeline raised during recomputation.
    pub async fn replay(&self, signal_id: &str) -> Result<ReplayOutcome, SignalflowError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ConfigurationError::missing_collaborator("signal store"))?;

        let snapshot = match store.find_one(signal_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!(signal_id, "No stored snapshot to replay");
                return Ok(ReplayOutcome::NotFound {
                    signal_id: signal_id.to_string(),
                });
            }
            Err(StoreError::Unavailable(reason)) => {
                return Err(ConfigurationError::new(
                    "signal store",
                    format!("signal store unavailable: {reason}"),
                )
                .into());
            }
            Err(err) => return Err(err.into()),
        };

        let input = reconstruct_input(&snapshot);
        if input.lossy {
            warn!(signal_id, "Replaying from a lossy reconstructed input");
        }

        let options = RunOptions {
            include_stage_summaries: self.include_stage_summaries,
            is_demo: false,
            signal_id: Some(snapshot.signal_id.clone()),
            scoring_time: Some(snapshot.scoring.scored_at),
        };
        let outcome = self
            .pipeline
            .run(input.payload, options)
            .await
            .map_err(recomputation_error)?;

        let stored = snapshot.scored_result();
        let comparison = compare_results(&stored, &outcome.result, self.epsilon);
        info!(
            signal_id,
            delta = comparison.delta,
            decision_changed = comparison.decision_changed,
            changed = comparison.has_changes(),
            "Replay compared"
        );

        Ok(ReplayOutcome::Replayed(Box::new(ReplayResult {
            signal_id: snapshot.signal_id,
            stored,
            recomputed: outcome.result,
            comparison,
            replay_meta: ReplayMeta {
                ran_at: now_utc(),
                pipeline_version: self.pipeline_version.clone(),
                lossy_input: input.lossy,
                notes: input.notes,
            },
            stage_summaries: outcome.stage_summaries,
        })))
    }
}

impl Debug for ReplayComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayComparator")
            .field("has_store", &self.store.is_some())
            .field("pipeline", &self.pipeline)
            .field("epsilon", &self.epsilon)
            .field("pipeline_version", &self.pipeline_version)
            .finish_non_exhaustive()
    }
}

fn recomputation_error(err: anyhow::Error) -> SignalflowError {
    match err.downcast::<SignalflowError>() {
        Ok(inner) => inner,
        Err(err) => StageExecutionError::new("replay", err).into(),
    }
}
