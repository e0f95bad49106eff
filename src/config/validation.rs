//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and metric naming rules
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::observability::metrics::is_valid_metric_name;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("server.request_timeout_secs must be greater than 0")]
    RequestTimeout,
    #[error("metrics.subsystem `{0}` is not a valid metric name prefix")]
    Subsystem(String),
    #[error("metrics.path `{0}` must start with '/'")]
    MetricsPath(String),
    #[error("metrics.quantiles must not be empty")]
    NoQuantiles,
    #[error("metrics.quantiles value {0} is outside [0, 1]")]
    Quantile(f64),
    #[error("metrics.upkeep_interval_secs must be greater than 0")]
    UpkeepInterval,
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    let subsystem = &config.metrics.subsystem;
    if !subsystem.is_empty() && !is_valid_metric_name(subsystem) {
        errors.push(ValidationError::Subsystem(subsystem.clone()));
    }
    if !config.metrics.path.starts_with('/') {
        errors.push(ValidationError::MetricsPath(config.metrics.path.clone()));
    }
    if config.metrics.quantiles.is_empty() {
        errors.push(ValidationError::NoQuantiles);
    }
    for &q in &config.metrics.quantiles {
        if !(0.0..=1.0).contains(&q) {
            errors.push(ValidationError::Quantile(q));
        }
    }
    if config.metrics.upkeep_interval_secs == 0 {
        errors.push(ValidationError::UpkeepInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
