//! Persisted signal snapshots and the result shape being compared.

use crate::pipeline::StageMeta;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Market and strategy metadata for a stored signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    /// Instrument symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Chart timeframe, e.g. `4h`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    /// Strategy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Trade direction, e.g. `long`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// Novelty / duplicate classification of a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoveltyInfo {
    /// Classification label, e.g. `novel` or `duplicate`.
    pub classification: String,
    /// Whether the signal duplicates an earlier one.
    #[serde(default)]
    pub is_duplicate: bool,
    /// The earlier signal this one duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    /// Wall-clock time the classification was computed. Differs on every
    /// replay and is excluded from comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<Timestamp>,
}

impl NoveltyInfo {
    /// Renders the replay-stable subset of the classification.
    #[must_use]
    pub fn stable_view(&self) -> String {
        match &self.duplicate_of {
            Some(of) => format!(
                "{} (duplicate={}, of={of})",
                self.classification, self.is_duplicate
            ),
            None => format!("{} (duplicate={})", self.classification, self.is_duplicate),
        }
    }
}

/// The comparable part of a scored signal, on either side of a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    /// Primary score.
    pub score: f64,
    /// Decision value, e.g. `take` or `skip`.
    pub decision: String,
    /// Decision confidence.
    #[serde(default)]
    pub confidence: f64,
    /// Reason codes behind the decision.
    #[serde(default)]
    pub reason_codes: Vec<String>,
    /// Canonical hash of the scoring configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// Scoring logic version tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_version: Option<String>,
    /// Novelty classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty: Option<NoveltyInfo>,
}

/// The scoring block of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRecord {
    /// Primary score.
    pub score: f64,
    /// Time the score was computed; replays reuse it for time decay.
    pub scored_at: Timestamp,
    /// Canonical hash of the scoring configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// Scoring logic version tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_version: Option<String>,
    /// Novelty classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub novelty: Option<NoveltyInfo>,
}

/// The decision block of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    /// Decision value.
    pub value: String,
    /// Decision confidence.
    #[serde(default)]
    pub confidence: f64,
    /// Reason codes behind the decision.
    #[serde(default)]
    pub reason_codes: Vec<String>,
}

/// One persisted signal as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    /// Signal id.
    pub signal_id: String,
    /// Market and strategy metadata.
    #[serde(default)]
    pub market: MarketInfo,
    /// Scoring result.
    pub scoring: ScoringRecord,
    /// Decision result.
    pub decision: DecisionRecord,
    /// Execution result, opaque to the comparator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<Value>,
    /// The verbatim inbound payload, when it was retained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    /// Provenance block, opaque to the comparator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Value>,
}

impl StoredSnapshot {
    /// Returns the stored side of a comparison.
    #[must_use]
    pub fn scored_result(&self) -> ScoredResult {
        ScoredResult {
            score: self.scoring.score,
            decision: self.decision.value.clone(),
            confidence: self.decision.confidence,
            reason_codes: self.decision.reason_codes.clone(),
            config_hash: self.scoring.config_hash.clone(),
            logic_version: self.scoring.logic_version.clone(),
            novelty: self.scoring.novelty.clone(),
        }
    }
}

/// What a pipeline run returns to the replay comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    /// The scored result.
    #[serde(flatten)]
    pub result: ScoredResult,
    /// Per-stage summaries, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_summaries: Option<Vec<StageMeta>>,
}
