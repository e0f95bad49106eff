//! Prometheus request instrumentation for axum services.
//!
//! Wraps every request passing through a [`axum::Router`] with a tower layer
//! that records a request counter and duration/size summaries, and mounts a
//! scrape endpoint serving the collected metrics in the Prometheus text
//! exposition format.
//!
//! ```ignore
//! let registry = MetricsRegistry::new();
//! let prometheus = Prometheus::new("api", &registry)?;
//! let app = prometheus.install(Router::new().route("/", get(index)));
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::{middleware, HandlerName, HttpServer, Prometheus, PrometheusLayer};
pub use lifecycle::Shutdown;
pub use observability::metrics::{MetricsError, MetricsRegistry, RequestMetrics};
