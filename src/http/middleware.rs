//! Request instrumentation middleware.
//!
//! # Responsibilities
//! - Time every request and measure request/response sizes
//! - Label the request counter with status code, method and handler
//! - Leave requests to the metrics path uninstrumented
//! - Mount the scrape endpoint next to the instrumentation
//!
//! # Design Decisions
//! - Plain tower `Layer`/`Service` so it composes with any axum router
//! - Request size is computed before dispatch, synchronously
//! - The observation is recorded once the response body has been written,
//!   so duration and response size cover streamed bodies
//! - Errors of the inner service are returned untouched and not observed

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    response::Response,
    Router,
};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::http::handler::HandlerName;
use crate::http::request::approximate_request_size;
use crate::http::response::MeteredBody;
use crate::http::scrape::scrape_route;
use crate::observability::metrics::{MetricsError, MetricsRegistry, RequestMetrics, RequestObservation};

/// Path the scrape endpoint is mounted on unless configured otherwise.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Request instrumentation for one subsystem.
pub struct Prometheus {
    /// Path serving the exposition. Requests to it are not instrumented.
    pub metrics_path: String,
    registry: MetricsRegistry,
    metrics: RequestMetrics,
}

impl Prometheus {
    /// Register the request metrics for `subsystem` on `registry`.
    ///
    /// Constructing several instances with the same subsystem shares one set
    /// of metrics. Fails when a metric name is invalid or already taken by an
    /// incompatible metric; callers are expected to abort startup.
    pub fn new(subsystem: &str, registry: &MetricsRegistry) -> Result<Self, MetricsError> {
        let metrics = RequestMetrics::register(registry, subsystem)?;
        tracing::debug!(subsystem = %subsystem, "request metrics registered");

        Ok(Self {
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            registry: registry.clone(),
            metrics,
        })
    }

    /// The instrumentation layer, skipping the current `metrics_path`.
    pub fn layer(&self) -> PrometheusLayer {
        PrometheusLayer::new(self.metrics.clone(), self.metrics_path.clone())
    }

    /// Add the scrape route and wrap every route of `router` with instrumentation.
    ///
    /// Routes added to the returned router afterwards are not instrumented.
    /// Panics, like [`Router::route`], if `metrics_path` is already routed.
    pub fn install<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        tracing::info!(path = %self.metrics_path, "installing request instrumentation");
        router
            .route(&self.metrics_path, scrape_route(self.registry.clone()))
            .layer(self.layer())
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }
}

/// Instrumentation layer for `subsystem` on the process default registry.
pub fn middleware(subsystem: &str) -> Result<PrometheusLayer, MetricsError> {
    Ok(Prometheus::new(subsystem, MetricsRegistry::global())?.layer())
}

struct Instrumentation {
    metrics: RequestMetrics,
    metrics_path: String,
}

/// Tower layer producing [`PrometheusService`].
#[derive(Clone)]
pub struct PrometheusLayer {
    state: Arc<Instrumentation>,
}

impl PrometheusLayer {
    pub fn new(metrics: RequestMetrics, metrics_path: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Instrumentation {
                metrics,
                metrics_path: metrics_path.into(),
            }),
        }
    }
}

impl<S> Layer<S> for PrometheusLayer {
    type Service = PrometheusService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PrometheusService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Service recording one observation per completed request.
///
/// A request completes when its response body ends or is dropped.
#[derive(Clone)]
pub struct PrometheusService<S> {
    inner: S,
    state: Arc<Instrumentation>,
}

impl<S> Service<Request<Body>> for PrometheusService<S>
where
    S: Service<Request<Body>, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if request.uri().path() == self.state.metrics_path {
            return Box::pin(self.inner.call(request));
        }

        let start = Instant::now();
        let request_size = approximate_request_size(&request);
        let method = request.method().as_str().to_ascii_lowercase();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_owned());

        let state = Arc::clone(&self.state);
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;

            let handler = match response.extensions().get::<HandlerName>() {
                Some(name) => name.as_str().to_owned(),
                None => route.unwrap_or_default(),
            };
            let code = response.status().as_u16().to_string();

            Ok(response.map(|body| {
                Body::new(MeteredBody::new(body, move |written| {
                    let observation = RequestObservation {
                        code,
                        method,
                        handler,
                        elapsed: start.elapsed(),
                        request_size,
                        response_size: written,
                    };
                    tracing::trace!(
                        code = %observation.code,
                        method = %observation.method,
                        handler = %observation.handler,
                        elapsed = ?observation.elapsed,
                        response_size = observation.response_size,
                        "request observed"
                    );
                    state.metrics.observe(&observation);
                }))
            }))
        })
    }
}
