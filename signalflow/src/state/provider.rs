//! Fail-soft nodes backed by an external prediction provider.

use super::{NodeConfig, PipelineNode, PipelineState};
use crate::context::RunContext;
use crate::core::NodeOutcome;
use crate::errors::ProviderUnavailableError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::warn;

/// An external predictor, such as an ML scoring service.
#[async_trait]
pub trait PredictionProvider: Send + Sync + Debug {
    /// Provider name, used in results and logs.
    fn name(&self) -> &str;

    /// Returns false when the provider cannot serve requests.
    async fn is_available(&self) -> bool;

    /// Produces a prediction for the given input.
    async fn predict(&self, input: &Value) -> anyhow::Result<Value>;
}

/// A leaf node that never fails the run.
///
/// Provider unavailability or a predict error is stored as
/// `{"serviceAvailable": false, "provider": ..., "reason": ...}` and the
/// node reports [`NodeOutcome::CompletedUnavailable`].
#[derive(Debug, Clone)]
pub struct ProviderNode {
    provider: Arc<dyn PredictionProvider>,
}

impl ProviderNode {
    /// Wraps a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn PredictionProvider>) -> Self {
        Self { provider }
    }

    /// Builds the provider input from the signal and results of the node's
    /// dependencies.
    fn input(config: &NodeConfig, state: &PipelineState) -> Value {
        let upstream: Map<String, Value> = config
            .dependencies
            .iter()
            .filter_map(|dep| state.result(dep).map(|v| (dep.clone(), v.clone())))
            .collect();
        json!({
            "signalId": state.signal_id,
            "signal": state.raw_signal,
            "enrichment": upstream,
        })
    }

    async fn call(&self, input: &Value) -> Result<Value, ProviderUnavailableError> {
        let name = self.provider.name();
        if !self.provider.is_available().await {
            return Err(ProviderUnavailableError::new(name, "provider reported unavailable"));
        }
        self.provider
            .predict(input)
            .await
            .map_err(|err| ProviderUnavailableError::new(name, err.to_string()))
    }
}

#[async_trait]
impl PipelineNode for ProviderNode {
    async fn execute(
        &self,
        config: &NodeConfig,
        state: &mut PipelineState,
        _ctx: &RunContext,
    ) -> NodeOutcome {
        let input = Self::input(config, state);
        match self.call(&input).await {
            Ok(prediction) => {
                state.set_result(
                    config.id.clone(),
                    json!({
                        "serviceAvailable": true,
                        "provider": self.provider.name(),
                        "prediction": prediction,
                    }),
                );
                NodeOutcome::CompletedAvailable
            }
            Err(err) => {
                warn!(
                    node = %config.id,
                    provider = %err.provider,
                    reason = %err.reason,
                    "Provider unavailable, continuing without it"
                );
                state.set_result(
                    config.id.clone(),
                    json!({
                        "serviceAvailable": false,
                        "provider": err.provider,
                        "reason": err.reason,
                    }),
                );
                NodeOutcome::CompletedUnavailable { reason: err.reason }
            }
        }
    }
}
