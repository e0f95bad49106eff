//! HTTP instrumentation subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware.rs (skip metrics path, start clock)
//!     → request.rs (approximate request size)
//!     → [downstream routes run to completion]
//!     → handler.rs (handler label from the response)
//!     → response.rs (count body bytes until the body ends or is dropped)
//!     → observability::metrics (counter + summaries)
//!
//! Metrics path:
//!     → scrape.rs (render registry, uninstrumented)
//! ```

pub mod handler;
pub mod middleware;
pub mod request;
pub mod response;
pub mod scrape;
pub mod server;

pub use handler::{derive_handler_label, named, HandlerName};
pub use middleware::{middleware, Prometheus, PrometheusLayer, PrometheusService, DEFAULT_METRICS_PATH};
pub use request::approximate_request_size;
pub use response::MeteredBody;
pub use server::HttpServer;
