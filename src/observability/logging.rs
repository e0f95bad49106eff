//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honour `RUST_LOG` over the configured level
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// Panics if a global subscriber was already installed; call once from `main`.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
