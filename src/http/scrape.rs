//! Scrape endpoint.
//!
//! Serves the registry in the Prometheus text exposition format. The route is
//! mounted by [`crate::http::Prometheus::install`] on the metrics path, which
//! the instrumentation layer skips.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};

use crate::observability::metrics::MetricsRegistry;

/// Content type of the Prometheus text format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn scrape(State(registry): State<MetricsRegistry>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        registry.render(),
    )
        .into_response()
}

/// `GET` route serving `registry`, usable in a router of any state type.
pub fn scrape_route<S>(registry: MetricsRegistry) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    get(scrape).with_state(registry)
}
