//! Metrics registration and exposition.
//!
//! # Responsibilities
//! - Own a Prometheus recorder and its render handle
//! - Register (or look up) named metrics with conflict detection
//! - Define the request metrics recorded by the instrumentation layer
//!
//! # Metrics
//! - `<subsystem>_requests_total` (counter): requests by code, method, handler
//! - `<subsystem>_request_duration_seconds` (summary): request latency
//! - `<subsystem>_request_size_bytes` (summary): approximate request size
//! - `<subsystem>_response_size_bytes` (summary): response body size
//!
//! # Design Decisions
//! - Summaries are recorder histograms; with no buckets configured the
//!   exporter renders them as Prometheus summaries (quantiles, sum, count)
//! - The registry is an explicit handle, cheap to clone, never ambient
//! - Recorded samples are buffered until an upkeep pass (or a render)
//!   folds them into the summaries; owners run [`MetricsRegistry::spawn_upkeep`]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{Counter, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Label names of the request counter, in `with_label_values` order.
pub const REQUEST_LABELS: [&str; 3] = ["code", "method", "handler"];

/// Summary quantiles used when none are configured.
pub const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Period between upkeep passes of the process default registry.
pub const DEFAULT_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Error type for metric registration.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The name is taken by a metric of another kind or label set.
    #[error("metric `{name}` is already registered as a {existing:?} with labels {labels:?}")]
    Conflict {
        name: String,
        existing: MetricKind,
        labels: Vec<&'static str>,
    },
    /// The name does not follow the Prometheus metric name grammar.
    #[error("invalid metric name `{0}`")]
    InvalidName(String),
    /// The exporter rejected the recorder settings.
    #[error("failed to build Prometheus recorder: {0}")]
    Build(#[from] BuildError),
}

/// Kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Descriptor {
    kind: MetricKind,
    labels: Vec<&'static str>,
}

struct Inner {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    descriptors: DashMap<String, Descriptor>,
}

/// A Prometheus registry shared by everything instrumenting one application.
///
/// Cloning is cheap and every clone points at the same metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

impl MetricsRegistry {
    /// Create a registry using the exporter's default summary quantiles.
    pub fn new() -> Self {
        Self::from_builder(PrometheusBuilder::new())
    }

    /// Create a registry whose summaries report the given quantiles.
    pub fn with_quantiles(quantiles: &[f64]) -> Result<Self, MetricsError> {
        let builder = PrometheusBuilder::new().set_quantiles(quantiles)?;
        Ok(Self::from_builder(builder))
    }

    /// The process default registry, created on first use.
    ///
    /// Lives as long as the process, so its upkeep runs on a dedicated thread
    /// rather than on whichever runtime happened to touch it first.
    pub fn global() -> &'static MetricsRegistry {
        static GLOBAL: OnceLock<MetricsRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let registry = MetricsRegistry::new();
            let upkeep = registry.clone();
            let spawned = std::thread::Builder::new()
                .name("metrics-upkeep".into())
                .spawn(move || loop {
                    std::thread::sleep(DEFAULT_UPKEEP_INTERVAL);
                    upkeep.run_upkeep();
                });
            if let Err(e) = spawned {
                tracing::warn!(error = %e, "failed to start metrics upkeep thread");
            }
            registry
        })
    }

    fn from_builder(builder: PrometheusBuilder) -> Self {
        let recorder = builder.build_recorder();
        let handle = recorder.handle();
        Self {
            inner: Arc::new(Inner {
                recorder,
                handle,
                descriptors: DashMap::new(),
            }),
        }
    }

    /// Register a counter family, or return the existing one with the same shape.
    pub fn register_counter_vec(
        &self,
        name: &str,
        help: &'static str,
        labels: &[&'static str],
    ) -> Result<CounterVec, MetricsError> {
        if self.claim(name, MetricKind::Counter, labels)? {
            self.inner
                .recorder
                .describe_counter(KeyName::from(name.to_owned()), None, help.into());
        }

        Ok(CounterVec {
            registry: self.clone(),
            name: name.to_owned(),
            labels: labels.to_vec(),
        })
    }

    /// Register an unlabeled summary, or return the existing one.
    pub fn register_summary(
        &self,
        name: &str,
        help: &'static str,
        unit: Unit,
    ) -> Result<Summary, MetricsError> {
        if self.claim(name, MetricKind::Summary, &[])? {
            self.inner
                .recorder
                .describe_histogram(KeyName::from(name.to_owned()), Some(unit), help.into());
        }

        let histogram = self
            .inner
            .recorder
            .register_histogram(&Key::from_name(name.to_owned()), &METADATA);
        Ok(Summary { histogram })
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> String {
        self.inner.handle.render()
    }

    /// Drain buffered samples into the summaries.
    pub fn run_upkeep(&self) {
        self.inner.handle.run_upkeep();
    }

    /// Run [`run_upkeep`](Self::run_upkeep) every `period` until `shutdown` fires.
    pub fn spawn_upkeep(
        &self,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            tracing::debug!(period = ?period, "metrics upkeep starting");
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => registry.run_upkeep(),
                    _ = shutdown.recv() => {
                        tracing::debug!("metrics upkeep received shutdown signal");
                        break;
                    }
                }
            }
        })
    }

    /// Record the descriptor for `name`. Returns `true` on first registration.
    fn claim(
        &self,
        name: &str,
        kind: MetricKind,
        labels: &[&'static str],
    ) -> Result<bool, MetricsError> {
        if !is_valid_metric_name(name) {
            return Err(MetricsError::InvalidName(name.to_owned()));
        }

        let wanted = Descriptor {
            kind,
            labels: labels.to_vec(),
        };
        match self.inner.descriptors.entry(name.to_owned()) {
            Entry::Occupied(existing) if *existing.get() == wanted => {
                tracing::debug!(metric = %name, "reusing registered metric");
                Ok(false)
            }
            Entry::Occupied(existing) => {
                let existing = existing.get().clone();
                Err(MetricsError::Conflict {
                    name: name.to_owned(),
                    existing: existing.kind,
                    labels: existing.labels,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(wanted);
                tracing::debug!(metric = %name, kind = ?kind, "registered metric");
                Ok(true)
            }
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A counter partitioned by a fixed set of label names.
#[derive(Clone)]
pub struct CounterVec {
    registry: MetricsRegistry,
    name: String,
    labels: Vec<&'static str>,
}

impl CounterVec {
    /// Counter for one combination of label values, given in label-name order.
    pub fn with_label_values(&self, values: &[&str]) -> Counter {
        debug_assert_eq!(values.len(), self.labels.len(), "label cardinality mismatch");

        let labels: Vec<Label> = self
            .labels
            .iter()
            .zip(values)
            .map(|(name, value)| Label::new(*name, (*value).to_owned()))
            .collect();
        let key = Key::from_parts(self.name.clone(), labels);
        self.registry.inner.recorder.register_counter(&key, &METADATA)
    }
}

/// A distribution of observed values.
#[derive(Clone)]
pub struct Summary {
    histogram: Histogram,
}

impl Summary {
    pub fn observe(&self, value: f64) {
        self.histogram.record(value);
    }
}

/// One finished request, ready to be recorded.
#[derive(Debug, Clone)]
pub struct RequestObservation {
    pub code: String,
    pub method: String,
    pub handler: String,
    pub elapsed: Duration,
    pub request_size: u64,
    pub response_size: u64,
}

/// The four request metrics of one subsystem.
#[derive(Clone)]
pub struct RequestMetrics {
    pub requests: CounterVec,
    pub duration: Summary,
    pub request_size: Summary,
    pub response_size: Summary,
}

impl RequestMetrics {
    /// Register the request metrics under `subsystem` (may be empty).
    pub fn register(registry: &MetricsRegistry, subsystem: &str) -> Result<Self, MetricsError> {
        let requests = registry.register_counter_vec(
            &qualified_name(subsystem, "requests_total"),
            "How many HTTP requests processed, partitioned by status code and HTTP method.",
            &REQUEST_LABELS,
        )?;
        let duration = registry.register_summary(
            &qualified_name(subsystem, "request_duration_seconds"),
            "The HTTP request latencies in seconds.",
            Unit::Seconds,
        )?;
        let request_size = registry.register_summary(
            &qualified_name(subsystem, "request_size_bytes"),
            "The HTTP request sizes in bytes.",
            Unit::Bytes,
        )?;
        let response_size = registry.register_summary(
            &qualified_name(subsystem, "response_size_bytes"),
            "The HTTP response sizes in bytes.",
            Unit::Bytes,
        )?;

        Ok(Self {
            requests,
            duration,
            request_size,
            response_size,
        })
    }

    pub fn observe(&self, observation: &RequestObservation) {
        self.duration.observe(observation.elapsed.as_secs_f64());
        self.requests
            .with_label_values(&[&observation.code, &observation.method, &observation.handler])
            .increment(1);
        self.request_size.observe(observation.request_size as f64);
        self.response_size.observe(observation.response_size as f64);
    }
}

/// Join a subsystem and a metric name the way Prometheus client libraries do.
pub fn qualified_name(subsystem: &str, name: &str) -> String {
    if subsystem.is_empty() {
        name.to_owned()
    } else {
        format!("{subsystem}_{name}")
    }
}

/// Check `name` against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("", "requests_total"), "requests_total");
        assert_eq!(qualified_name("api", "requests_total"), "api_requests_total");
    }

    #[test]
    fn test_metric_name_grammar() {
        assert!(is_valid_metric_name("requests_total"));
        assert!(is_valid_metric_name("_private:sub_1"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("1st"));
        assert!(!is_valid_metric_name("my-app_requests_total"));
    }

    #[test]
    fn test_duplicate_registration_is_reused() {
        let registry = MetricsRegistry::new();
        assert!(RequestMetrics::register(&registry, "dup").is_ok());
        assert!(RequestMetrics::register(&registry, "dup").is_ok());
    }

    #[test]
    fn test_kind_conflict_is_rejected() {
        let registry = MetricsRegistry::new();
        registry
            .register_summary("clash_requests_total", "wrong kind", Unit::Count)
            .unwrap();

        let err = RequestMetrics::register(&registry, "clash").err().unwrap();
        assert!(matches!(
            err,
            MetricsError::Conflict { existing: MetricKind::Summary, .. }
        ));
    }

    #[test]
    fn test_label_conflict_is_rejected() {
        let registry = MetricsRegistry::new();
        registry
            .register_counter_vec("requests_total", "other labels", &["code"])
            .unwrap();

        assert!(matches!(
            RequestMetrics::register(&registry, ""),
            Err(MetricsError::Conflict { .. })
        ));
    }

    #[test]
    fn test_invalid_subsystem_is_rejected() {
        let registry = MetricsRegistry::new();
        assert!(matches!(
            RequestMetrics::register(&registry, "my-app"),
            Err(MetricsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_empty_quantiles_fail_to_build() {
        assert!(matches!(
            MetricsRegistry::with_quantiles(&[]),
            Err(MetricsError::Build(_))
        ));
    }

    #[test]
    fn test_observe_renders_counter_and_summaries() {
        let registry = MetricsRegistry::with_quantiles(&DEFAULT_QUANTILES).unwrap();
        let metrics = RequestMetrics::register(&registry, "unit").unwrap();

        metrics.observe(&RequestObservation {
            code: "200".into(),
            method: "get".into(),
            handler: "Index".into(),
            elapsed: Duration::from_millis(5),
            request_size: 33,
            response_size: 5,
        });

        let text = registry.render();
        assert!(text.contains("unit_requests_total{"));
        assert!(text.contains("handler=\"Index\""));
        assert!(text.contains("unit_request_duration_seconds_count 1"));
        assert!(text.contains("unit_request_size_bytes_sum 33"));
        assert!(text.contains("unit_response_size_bytes_sum 5"));
    }

    #[test]
    fn test_observations_survive_upkeep() {
        let registry = MetricsRegistry::new();
        let metrics = RequestMetrics::register(&registry, "kept").unwrap();
        let observation = RequestObservation {
            code: "200".into(),
            method: "get".into(),
            handler: String::new(),
            elapsed: Duration::from_millis(1),
            request_size: 10,
            response_size: 3,
        };

        metrics.observe(&observation);
        registry.run_upkeep();
        registry.run_upkeep();
        metrics.observe(&observation);
        registry.run_upkeep();

        let text = registry.render();
        assert!(text.contains("kept_request_duration_seconds_count 2"));
        assert!(text.contains("kept_request_size_bytes_sum 20"));
        assert!(text.contains("kept_response_size_bytes_sum 6"));
    }

    #[tokio::test]
    async fn test_upkeep_task_stops_on_shutdown() {
        let registry = MetricsRegistry::new();
        let shutdown = Shutdown::new();
        let handle = registry.spawn_upkeep(Duration::from_millis(10), shutdown.subscribe());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(shutdown.trigger(), 1);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("upkeep task did not stop")
            .unwrap();
    }

    #[test]
    fn test_registries_are_isolated() {
        let first = MetricsRegistry::new();
        let second = MetricsRegistry::new();
        let metrics = RequestMetrics::register(&first, "iso").unwrap();
        RequestMetrics::register(&second, "iso").unwrap();

        metrics.requests.with_label_values(&["200", "get", ""]).increment(1);

        assert!(first.render().contains("iso_requests_total{"));
        assert!(!second.render().contains("iso_requests_total{"));
    }
}
