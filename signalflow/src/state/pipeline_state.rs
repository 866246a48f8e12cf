//! Per-signal pipeline state.

use super::{ExecutionTraceEntry, NodeConfig};
use crate::core::TraceStatus;
use crate::errors::{SignalflowError, StateInvariantError};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Default length above which a signal id draws a warning.
pub const DEFAULT_SIGNAL_ID_MAX_LEN: usize = 255;

/// Prefix marking enrichment keys written by bookkeeping rather than a node.
pub const SYNTHETIC_KEY_PREFIX: char = '_';

/// Enrichment results in insertion order.
///
/// Serializes as an array of `[key, value]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichmentResults(Vec<(String, Value)>);

impl EnrichmentResults {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a result, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    /// Looks up a result.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns true if a result exists for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Run metadata carried with the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMetadata {
    /// When the state was created.
    pub start_time: Timestamp,
    /// Node execution records in completion order.
    #[serde(default)]
    pub trace: Vec<ExecutionTraceEntry>,
}

/// Mutable record for one in-flight signal.
///
/// Owned exclusively by the run that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    /// The signal being processed.
    pub signal_id: String,
    /// The inbound payload, opaque to the engine.
    #[serde(default)]
    pub raw_signal: Value,
    /// Results accumulated by nodes.
    #[serde(default)]
    pub enrichment_results: EnrichmentResults,
    /// Declared nodes, in declaration order.
    #[serde(default)]
    pub node_configs: Vec<NodeConfig>,
    /// The node currently executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
    /// Timing and trace.
    pub metadata: StateMetadata,
}

/// Warnings and counts produced by [`PipelineState::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Soft findings that do not reject the state.
    pub warnings: Vec<String>,
    /// Number of trace entries checked.
    pub trace_entries: usize,
}

impl ValidationReport {
    /// Returns true if no warnings were raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl PipelineState {
    /// Creates a fresh state for one signal.
    #[must_use]
    pub fn new(signal_id: impl Into<String>, raw_signal: Value, node_configs: Vec<NodeConfig>) -> Self {
        Self {
            signal_id: signal_id.into(),
            raw_signal,
            enrichment_results: EnrichmentResults::new(),
            node_configs,
            current_node: None,
            metadata: StateMetadata {
                start_time: now_utc(),
                trace: Vec::new(),
            },
        }
    }

    /// Records a node result.
    pub fn set_result(&mut self, key: impl Into<String>, value: Value) {
        self.enrichment_results.insert(key, value);
    }

    /// Returns a node result.
    #[must_use]
    pub fn result(&self, key: &str) -> Option<&Value> {
        self.enrichment_results.get(key)
    }

    /// Returns the execution trace.
    #[must_use]
    pub fn trace(&self) -> &[ExecutionTraceEntry] {
        &self.metadata.trace
    }

    /// Appends a trace entry.
    pub fn push_trace(&mut self, entry: ExecutionTraceEntry) {
        self.metadata.trace.push(entry);
    }

    /// Serializes the state for checkpointing.
    ///
    /// # Errors
    ///
    /// Returns `SignalflowError::Serialization` if a payload cannot be encoded.
    pub fn to_json(&self) -> Result<String, SignalflowError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the state as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns `SignalflowError::Serialization` if a payload cannot be encoded.
    pub fn to_json_pretty(&self) -> Result<String, SignalflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restores a state from a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `SignalflowError::Serialization` for malformed input.
    pub fn from_json(input: &str) -> Result<Self, SignalflowError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Checks structural invariants using the default signal id limit.
    ///
    /// # Errors
    ///
    /// See [`PipelineState::validate_with_limit`].
    pub fn validate(&self) -> Result<ValidationReport, StateInvariantError> {
        self.validate_with_limit(DEFAULT_SIGNAL_ID_MAX_LEN)
    }

    /// Checks structural invariants.
    ///
    /// Hard violations: an empty signal id, a `running` entry carrying
    /// `endTime` or `durationMs`, and trace start times going backwards.
    /// Everything else (long signal ids, finished entries missing timing,
    /// results with no trace entry) is reported as a warning. Result keys
    /// starting with `_` are bookkeeping and never warned about.
    ///
    /// # Errors
    ///
    /// Returns `StateInvariantError` listing every hard violation.
    pub fn validate_with_limit(
        &self,
        signal_id_max_len: usize,
    ) -> Result<ValidationReport, StateInvariantError> {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        if self.signal_id.trim().is_empty() {
            violations.push("signalId must not be empty".to_string());
        } else if self.signal_id.chars().count() > signal_id_max_len {
            warnings.push(format!(
                "signalId is {} characters, above the {signal_id_max_len} limit",
                self.signal_id.chars().count()
            ));
        }

        let trace = self.trace();
        for (i, entry) in trace.iter().enumerate() {
            match entry.status {
                TraceStatus::Running => {
                    if entry.end_time.is_some() || entry.duration_ms.is_some() {
                        violations.push(format!(
                            "trace[{i}] node '{}' is running but carries endTime/durationMs",
                            entry.node_id
                        ));
                    }
                }
                TraceStatus::Completed | TraceStatus::Failed => {
                    if entry.end_time.is_none() || entry.duration_ms.is_none() {
                        warnings.push(format!(
                            "trace[{i}] node '{}' is {} but is missing endTime/durationMs",
                            entry.node_id, entry.status
                        ));
                    }
                }
                TraceStatus::Pending => {}
            }
        }

        for (i, pair) in trace.windows(2).enumerate() {
            if pair[1].start_time < pair[0].start_time {
                violations.push(format!(
                    "trace[{}] node '{}' starts before trace[{i}] node '{}'",
                    i + 1,
                    pair[1].node_id,
                    pair[0].node_id
                ));
            }
        }

        let traced: HashSet<&str> = trace.iter().map(|e| e.node_id.as_str()).collect();
        for key in self.enrichment_results.keys() {
            if !key.starts_with(SYNTHETIC_KEY_PREFIX) && !traced.contains(key) {
                warnings.push(format!("enrichment result '{key}' has no trace entry"));
            }
        }

        if violations.is_empty() {
            Ok(ValidationReport {
                warnings,
                trace_entries: trace.len(),
            })
        } else {
            Err(StateInvariantError { violations })
        }
    }
}
