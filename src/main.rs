//! Instrumented demo server.
//!
//! Serves a couple of demo routes wrapped in request instrumentation and
//! exposes the collected metrics for Prometheus to scrape.
//!
//! ```text
//! request ──▶ TraceLayer ──▶ PrometheusLayer ──▶ TimeoutLayer ──▶ handler
//!                                  │
//!                                  ▼
//!                           MetricsRegistry ──▶ GET /metrics
//!                                  ▲
//!                           upkeep task (every upkeep_interval_secs)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use http_prometheus::config::{load_config, AppConfig};
use http_prometheus::lifecycle::{signals, Shutdown};
use http_prometheus::observability::logging;
use http_prometheus::{HttpServer, MetricsRegistry};

#[derive(Parser)]
#[command(name = "http-prometheus")]
#[command(about = "Demo HTTP server with Prometheus request metrics", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&config.logging);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        subsystem = %config.metrics.subsystem,
        metrics_path = %config.metrics.path,
        "Configuration loaded"
    );

    let registry = MetricsRegistry::with_quantiles(&config.metrics.quantiles)?;
    let upkeep_interval = Duration::from_secs(config.metrics.upkeep_interval_secs);
    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(config, registry.clone())?;

    let shutdown = Shutdown::new();
    let upkeep = registry.spawn_upkeep(upkeep_interval, shutdown.subscribe());
    let mut handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut handle => {
            shutdown.trigger();
            upkeep.await?;
            result??;
            return Ok(());
        }
        _ = signals::wait_for_signal() => {}
    }
    let notified = shutdown.trigger();
    tracing::info!(tasks = notified, "Shutting down");
    handle.await??;
    upkeep.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
