//! Rebuilding the pipeline input for a stored signal.

use super::StoredSnapshot;
use serde::Serialize;
use serde_json::{Map, Value};

/// Note attached to every input rebuilt from structured fields.
pub const LOSSY_INPUT_NOTE: &str =
    "raw input was not retained; input rebuilt from structured fields and free-text fields are not recoverable";

/// A pipeline input recovered from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructedInput {
    /// The payload to feed the pipeline.
    pub payload: Value,
    /// True when the payload was rebuilt rather than taken verbatim.
    pub lossy: bool,
    /// Notes about how the payload was obtained.
    pub notes: Vec<String>,
}

/// Recovers the pipeline input for a snapshot.
///
/// The verbatim raw input wins whenever it was retained. Otherwise the
/// payload carries only the structured market fields that are present and
/// is flagged lossy; nothing is invented for absent fields.
#[must_use]
pub fn reconstruct_input(snapshot: &StoredSnapshot) -> ReconstructedInput {
    if let Some(raw) = &snapshot.raw_input {
        return ReconstructedInput {
            payload: raw.clone(),
            lossy: false,
            notes: vec!["replayed from verbatim raw input".to_string()],
        };
    }

    let market = &snapshot.market;
    let mut payload = Map::new();
    for (key, value) in [
        ("symbol", &market.symbol),
        ("timeframe", &market.timeframe),
        ("strategy", &market.strategy),
        ("direction", &market.direction),
    ] {
        if let Some(value) = value {
            payload.insert(key.to_string(), Value::String(value.clone()));
        }
    }

    ReconstructedInput {
        payload: Value::Object(payload),
        lossy: true,
        notes: vec![LOSSY_INPUT_NOTE.to_string()],
    }
}
