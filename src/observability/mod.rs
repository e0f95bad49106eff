//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request instrumentation (http::middleware)
//!     → metrics.rs (counter + summaries on an injected registry)
//!     → rendered by http::scrape on the metrics path
//!
//! Process-wide:
//!     → logging.rs (tracing subscriber, env filter, text or JSON)
//! ```
//!
//! # Design Decisions
//! - Registries are explicit values, one per application (or per test)
//! - Registration is register-or-get so duplicate construction is tolerated
//! - Metric updates are lock-free atomic operations inside the exporter

pub mod logging;
pub mod metrics;
