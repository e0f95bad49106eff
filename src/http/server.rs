//! Instrumented HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router with the demo handlers
//! - Install request instrumentation and the scrape endpoint
//! - Wire up tower-http middleware (tracing, timeout)
//! - Keep the timeout inside the instrumentation so timed out requests
//!   are counted with their 408
//! - Serve until the shutdown signal fires

use axum::{
    body::Bytes,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::http::handler::named;
use crate::http::middleware::Prometheus;
use crate::observability::metrics::{MetricsError, MetricsRegistry};

/// HTTP server exposing demo routes and their metrics.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create the server, registering its metrics on `registry`.
    pub fn new(config: AppConfig, registry: MetricsRegistry) -> Result<Self, MetricsError> {
        let mut prometheus = Prometheus::new(&config.metrics.subsystem, &registry)?;
        prometheus.metrics_path = config.metrics.path.clone();

        let router = Self::build_router(&config, &prometheus);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &AppConfig, prometheus: &Prometheus) -> Router {
        let app = Router::new()
            .route("/", named("HandleIndex", get(index)))
            .route("/echo", named("HandleEcho", post(echo)));

        let timeout = Duration::from_secs(config.server.request_timeout_secs);
        Self::layered(app, timeout, prometheus)
    }

    /// Wrap `app` in timeout, instrumentation and tracing, innermost first.
    #[allow(deprecated)]
    fn layered(app: Router, timeout: Duration, prometheus: &Prometheus) -> Router {
        prometheus
            .install(app.layer(TimeoutLayer::new(timeout)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` receives a signal.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            metrics_path = %self.config.metrics.path,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn index() -> &'static str {
    "ok"
}

async fn echo(body: Bytes) -> Bytes {
    body
}
