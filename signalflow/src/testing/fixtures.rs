//! Test fixtures for snapshots, results and node pipelines.

use chrono::TimeZone;
use serde_json::{json, Value};

use crate::core::NodeType;
use crate::replay::{
    DecisionRecord, MarketInfo, NoveltyInfo, PipelineOutcome, ScoredResult, ScoringRecord,
    StoredSnapshot,
};
use crate::state::{NodeConfig, PipelineState};
use crate::utils::Timestamp;

/// Scoring config hash used by every fixture.
pub const FIXTURE_CONFIG_HASH: &str =
    "5f2b1c0e9d8a7b6c5d4e3f2a1b0c9d8e7f6a5b4c3d2e1f0a9b8c7d6e5f4a3b2c";

/// Scoring logic version used by every fixture.
pub const FIXTURE_LOGIC_VERSION: &str = "scoring-v3";

/// The stored scoring time used by every fixture.
#[must_use]
pub fn fixture_scored_at() -> Timestamp {
    chrono::Utc
        .with_ymd_and_hms(2024, 4, 1, 10, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A stored snapshot with verbatim raw input.
#[must_use]
pub fn snapshot_fixture(signal_id: &str) -> StoredSnapshot {
    StoredSnapshot {
        signal_id: signal_id.to_string(),
        market: MarketInfo {
            symbol: Some("BTCUSDT".into()),
            timeframe: Some("4h".into()),
            strategy: Some("breakout".into()),
            direction: Some("long".into()),
        },
        scoring: ScoringRecord {
            score: 72.5,
            scored_at: fixture_scored_at(),
            config_hash: Some(FIXTURE_CONFIG_HASH.into()),
            logic_version: Some(FIXTURE_LOGIC_VERSION.into()),
            novelty: Some(NoveltyInfo {
                classification: "novel".into(),
                is_duplicate: false,
                duplicate_of: None,
                computed_at: Some(fixture_scored_at()),
            }),
        },
        decision: DecisionRecord {
            value: "take".into(),
            confidence: 0.81,
            reason_codes: vec!["TREND_UP".into(), "VOLUME_SPIKE".into()],
        },
        execution: Some(json!({ "status": "filled" })),
        raw_input: Some(json!({
            "symbol": "BTCUSDT",
            "timeframe": "4h",
            "text": "BTC 4h breakout, going long above 64k",
        })),
        provenance: Some(json!({ "source": "webhook" })),
    }
}

/// The recomputed outcome matching [`snapshot_fixture`] exactly.
#[must_use]
pub fn matching_outcome() -> PipelineOutcome {
    PipelineOutcome {
        result: snapshot_fixture("fixture").scored_result(),
        stage_summaries: None,
    }
}

/// A scored result as JSON, the shape a final stage returns.
#[must_use]
pub fn scored_payload(result: &ScoredResult) -> Value {
    serde_json::to_value(result).unwrap_or(Value::Null)
}

/// A state with a small enrichment pipeline declared.
#[must_use]
pub fn state_fixture(signal_id: &str) -> PipelineState {
    PipelineState::new(
        signal_id,
        json!({ "symbol": "ETHUSDT", "text": "ETH reclaiming range high" }),
        vec![
            NodeConfig::new("ta", NodeType::Required, "technical-indicators"),
            NodeConfig::new("patterns", NodeType::Enrichment, "pattern-recognition")
                .with_dependency("ta"),
            NodeConfig::new("ml", NodeType::Enrichment, "ai-ml").with_dependency("patterns"),
        ],
    )
}
