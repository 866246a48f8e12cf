//! Canonical configuration hashing.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Rewrites a JSON value with object keys sorted at every level.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Returns the hex SHA-256 of the canonical JSON form of a configuration.
///
/// Key order never affects the hash; any value change does.
#[must_use]
pub fn canonical_config_hash(config: &Value) -> String {
    let canonical = canonicalize(config).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Hashes any serializable configuration.
///
/// # Errors
///
/// Returns the serialization error if `config` cannot be represented as JSON.
pub fn hash_serializable<T: Serialize>(config: &T) -> Result<String, serde_json::Error> {
    Ok(canonical_config_hash(&serde_json::to_value(config)?))
}
