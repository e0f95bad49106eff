//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::http::DEFAULT_METRICS_PATH;
use crate::observability::metrics::{DEFAULT_QUANTILES, DEFAULT_UPKEEP_INTERVAL};

/// Root configuration of the instrumented server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and request handling.
    pub server: ServerConfig,

    /// Request instrumentation.
    pub metrics: MetricsConfig,

    /// Log output.
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Instrumentation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prefix of every metric name; empty for none.
    pub subsystem: String,

    /// Path of the scrape endpoint.
    pub path: String,

    /// Quantiles reported by the summaries.
    pub quantiles: Vec<f64>,

    /// Seconds between passes folding buffered samples into the summaries.
    pub upkeep_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            subsystem: String::new(),
            path: DEFAULT_METRICS_PATH.to_string(),
            quantiles: DEFAULT_QUANTILES.to_vec(),
            upkeep_interval_secs: DEFAULT_UPKEEP_INTERVAL.as_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`.
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
