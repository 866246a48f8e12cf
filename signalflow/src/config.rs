//! Engine configuration.
//!
//! Defaults are overridden from a JSON document or from `SIGNALFLOW_*`
//! environment variables.

use crate::errors::{ConfigurationError, StateInvariantError};
use crate::observability::LogFormat;
use crate::pipeline::DagExecutor;
use crate::replay::{ReplayComparator, DEFAULT_SCORE_EPSILON};
use crate::state::{PipelineState, ValidationReport, DEFAULT_SIGNAL_ID_MAX_LEN};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Caps concurrently running stages.
pub const ENV_MAX_CONCURRENCY: &str = "SIGNALFLOW_MAX_CONCURRENCY";
/// Numeric tolerance for replay comparisons.
pub const ENV_SCORE_EPSILON: &str = "SIGNALFLOW_SCORE_EPSILON";
/// Version reported in replay metadata.
pub const ENV_PIPELINE_VERSION: &str = "SIGNALFLOW_PIPELINE_VERSION";
/// `plain` or `json`.
pub const ENV_LOG_FORMAT: &str = "SIGNALFLOW_LOG_FORMAT";

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Cap on concurrently running stages; `None` is unbounded.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Tolerance for score and confidence comparisons.
    #[serde(default = "default_score_epsilon")]
    pub score_epsilon: f64,
    /// Signal ids longer than this produce a validation warning.
    #[serde(default = "default_signal_id_max_len")]
    pub signal_id_max_len: usize,
    /// Version reported in replay metadata.
    #[serde(default = "default_pipeline_version")]
    pub pipeline_version: String,
    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_score_epsilon() -> f64 {
    DEFAULT_SCORE_EPSILON
}

fn default_signal_id_max_len() -> usize {
    DEFAULT_SIGNAL_ID_MAX_LEN
}

fn default_pipeline_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            score_epsilon: default_score_epsilon(),
            signal_id_max_len: default_signal_id_max_len(),
            pipeline_version: default_pipeline_version(),
            log_format: LogFormat::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults overlaid with `SIGNALFLOW_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads defaults overlaid with variables from `lookup`.
    ///
    /// Blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = var(ENV_MAX_CONCURRENCY) {
            let cap: usize = parse_var(ENV_MAX_CONCURRENCY, &raw)?;
            if cap == 0 {
                return Err(ConfigurationError::new(
                    ENV_MAX_CONCURRENCY,
                    format!("{ENV_MAX_CONCURRENCY} must be at least 1"),
                ));
            }
            config.max_concurrency = Some(cap);
        }
        if let Some(raw) = var(ENV_SCORE_EPSILON) {
            let epsilon: f64 = parse_var(ENV_SCORE_EPSILON, &raw)?;
            if !epsilon.is_finite() || epsilon < 0.0 {
                return Err(ConfigurationError::new(
                    ENV_SCORE_EPSILON,
                    format!("{ENV_SCORE_EPSILON} must be a non-negative number, got '{raw}'"),
                ));
            }
            config.score_epsilon = epsilon;
        }
        if let Some(raw) = var(ENV_PIPELINE_VERSION) {
            config.pipeline_version = raw.trim().to_string();
        }
        if let Some(raw) = var(ENV_LOG_FORMAT) {
            config.log_format = raw.parse().map_err(|e: ConfigurationError| {
                ConfigurationError::new(ENV_LOG_FORMAT, e.message)
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::new("config", format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrency == Some(0) {
            return Err(ConfigurationError::new(
                "maxConcurrency",
                "maxConcurrency must be at least 1",
            ));
        }
        if !self.score_epsilon.is_finite() || self.score_epsilon < 0.0 {
            return Err(ConfigurationError::new(
                "scoreEpsilon",
                format!("scoreEpsilon must be a non-negative number, got {}", self.score_epsilon),
            ));
        }
        Ok(())
    }

    /// Sets the concurrency cap.
    #[must_use]
    pub fn with_max_concurrency(mut self, cap: usize) -> Self {
        self.max_concurrency = Some(cap);
        self
    }

    /// Sets the comparison tolerance.
    #[must_use]
    pub fn with_score_epsilon(mut self, epsilon: f64) -> Self {
        self.score_epsilon = epsilon;
        self
    }

    /// Sets the signal id length warning threshold.
    #[must_use]
    pub fn with_signal_id_max_len(mut self, len: usize) -> Self {
        self.signal_id_max_len = len;
        self
    }

    /// Sets the reported pipeline version.
    #[must_use]
    pub fn with_pipeline_version(mut self, version: impl Into<String>) -> Self {
        self.pipeline_version = version.into();
        self
    }

    /// Sets the log format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Applies the concurrency cap to an executor.
    #[must_use]
    pub fn configure_executor(&self, executor: DagExecutor) -> DagExecutor {
        executor.with_optional_max_concurrency(self.max_concurrency)
    }

    /// Applies tolerance and version to a comparator.
    #[must_use]
    pub fn configure_comparator(&self, comparator: ReplayComparator) -> ReplayComparator {
        comparator
            .with_epsilon(self.score_epsilon)
            .with_pipeline_version(self.pipeline_version.clone())
    }

    /// Validates a state with the configured id length threshold.
    pub fn validate_state(
        &self,
        state: &PipelineState,
    ) -> Result<ValidationReport, StateInvariantError> {
        state.validate_with_limit(self.signal_id_max_len)
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        ConfigurationError::new(name, format!("{name} has invalid value '{raw}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.max_concurrency, None);
        assert!((config.score_epsilon - 1e-4).abs() < f64::EPSILON);
        assert_eq!(config.signal_id_max_len, 255);
        assert_eq!(config.pipeline_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn test_env_overlay() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_MAX_CONCURRENCY, "4"),
            (ENV_SCORE_EPSILON, "0.01"),
            (ENV_PIPELINE_VERSION, " 2.3.1 "),
            (ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();

        assert_eq!(config.max_concurrency, Some(4));
        assert!((config.score_epsilon - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.pipeline_version, "2.3.1");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[(ENV_MAX_CONCURRENCY, "  ")])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_malformed_env_names_variable() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_MAX_CONCURRENCY, "many")])).unwrap_err();
        assert_eq!(err.field, ENV_MAX_CONCURRENCY);
        assert!(err.message.contains("many"));

        let err = EngineConfig::from_lookup(lookup(&[(ENV_MAX_CONCURRENCY, "0")])).unwrap_err();
        assert_eq!(err.field, ENV_MAX_CONCURRENCY);

        let err = EngineConfig::from_lookup(lookup(&[(ENV_LOG_FORMAT, "xml")])).unwrap_err();
        assert_eq!(err.field, ENV_LOG_FORMAT);

        let err = EngineConfig::from_lookup(lookup(&[(ENV_SCORE_EPSILON, "-1")])).unwrap_err();
        assert_eq!(err.field, ENV_SCORE_EPSILON);
    }

    #[test]
    fn test_from_json_str() {
        let config = EngineConfig::from_json_str(
            r#"{ "maxConcurrency": 2, "pipelineVersion": "audit", "logFormat": "json" }"#,
        )
        .unwrap();

        assert_eq!(config.max_concurrency, Some(2));
        assert_eq!(config.pipeline_version, "audit");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.signal_id_max_len, 255);

        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.field, "config");
        assert!(EngineConfig::from_json_str(r#"{ "maxConcurrency": 0 }"#).is_err());
    }

    #[test]
    fn test_builders_and_state_validation() {
        let config = EngineConfig::new()
            .with_max_concurrency(3)
            .with_score_epsilon(0.5)
            .with_signal_id_max_len(4)
            .with_pipeline_version("x")
            .with_log_format(LogFormat::Json);
        assert_eq!(config.max_concurrency, Some(3));

        let state = crate::testing::state_fixture("sig-long-id");
        let report = config.validate_state(&state).unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("above the 4 limit")));
    }
}
