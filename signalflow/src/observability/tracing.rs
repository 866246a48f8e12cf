//! Tracing subscriber setup and span timing.
//!
//! The engine only emits `tracing` events; installing a subscriber is left
//! to the binary embedding it. [`init_tracing`] is the default setup.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(ConfigurationError::new(
                "log_format",
                format!("unsupported log format '{other}', expected 'plain' or 'json'"),
            )),
        }
    }
}

/// Installs the global subscriber.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. Returns false
/// if a global subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.is_ok()
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span, logs it at trace level and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed_ms();
        tracing::trace!(span_name = %self.name, duration_ms, "Span finished");
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Plain ".parse::<LogFormat>().unwrap(), LogFormat::Plain);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Plain);

        let err = "yaml".parse::<LogFormat>().unwrap_err();
        assert_eq!(err.field, "log_format");
        assert!(err.message.contains("yaml"));
    }

    #[test]
    fn test_log_format_serde() {
        assert_eq!(serde_json::to_string(&LogFormat::Json).unwrap(), "\"json\"");
        let parsed: LogFormat = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(parsed, LogFormat::Plain);
        assert_eq!(LogFormat::default().to_string(), "plain");
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("test_span");
        assert_eq!(timer.name(), "test_span");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let duration = timer.finish();
        assert!(duration >= 10.0);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let _ = init_tracing(LogFormat::Plain);
        assert!(!init_tracing(LogFormat::Json));
    }
}
