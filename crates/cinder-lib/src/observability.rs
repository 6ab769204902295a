//! Observability infrastructure for the Cinder collector
//!
//! Provides:
//! - Prometheus metrics (collection and discovery latency, authentications,
//!   adapter calls, errors, emitted records, cached quotas)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds); cloud calls are slow
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CollectorMetricsInner> = OnceLock::new();

struct CollectorMetricsInner {
    collection_latency_seconds: Histogram,
    discovery_latency_seconds: Histogram,
    authentications: IntCounterVec,
    adapter_calls: IntCounterVec,
    collection_errors: IntCounterVec,
    records_emitted: IntCounter,
    cached_limits: IntGauge,
}

impl CollectorMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "cinder_collector_collection_latency_seconds",
                "Time spent serving one collect call",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            discovery_latency_seconds: register_histogram!(
                "cinder_collector_discovery_latency_seconds",
                "Time spent enumerating metric paths",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register discovery_latency_seconds"),

            authentications: register_int_counter_vec!(
                "cinder_collector_authentications_total",
                "Identity service authentications by outcome",
                &["outcome"]
            )
            .expect("Failed to register authentications_total"),

            adapter_calls: register_int_counter_vec!(
                "cinder_collector_adapter_calls_total",
                "Block storage API calls by version and operation",
                &["version", "operation"]
            )
            .expect("Failed to register adapter_calls_total"),

            collection_errors: register_int_counter_vec!(
                "cinder_collector_collection_errors_total",
                "Failed collector operations by error kind",
                &["kind"]
            )
            .expect("Failed to register collection_errors_total"),

            records_emitted: register_int_counter!(
                "cinder_collector_records_emitted_total",
                "Metric records returned to callers"
            )
            .expect("Failed to register records_emitted_total"),

            cached_limits: register_int_gauge!(
                "cinder_collector_cached_limits",
                "Tenants whose quota is held in the limits cache"
            )
            .expect("Failed to register cached_limits"),
        }
    }
}

/// Collector metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance. Clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct CollectorMetrics {
    _private: (),
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CollectorMetricsInner {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new)
    }

    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner().collection_latency_seconds.observe(duration_secs);
    }

    pub fn observe_discovery_latency(&self, duration_secs: f64) {
        self.inner().discovery_latency_seconds.observe(duration_secs);
    }

    /// Count an authentication attempt; `outcome` is `success` or `failure`
    pub fn inc_authentications(&self, outcome: &str) {
        self.inner()
            .authentications
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn inc_adapter_calls(&self, version: &str, operation: &str) {
        self.inner()
            .adapter_calls
            .with_label_values(&[version, operation])
            .inc();
    }

    pub fn inc_collection_errors(&self, kind: &str) {
        self.inner()
            .collection_errors
            .with_label_values(&[kind])
            .inc();
    }

    pub fn add_records_emitted(&self, count: u64) {
        self.inner().records_emitted.inc_by(count);
    }

    pub fn set_cached_limits(&self, tenants: i64) {
        self.inner().cached_limits.set(tenants);
    }
}

/// Structured logger for collector events
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Log a completed collect call
    pub fn log_collection(&self, requested: usize, records: usize, elapsed_ms: u128) {
        info!(
            event = "collection_completed",
            source = %self.source,
            requested = requested,
            records = records,
            elapsed_ms = elapsed_ms as u64,
            "Collected block storage metrics"
        );
    }

    /// Log a failed collect or discover call
    pub fn log_failure(&self, operation: &str, kind: &str, error: &str) {
        warn!(
            event = "collection_failed",
            source = %self.source,
            operation = %operation,
            kind = %kind,
            error = %error,
            "Collector operation failed"
        );
    }

    /// Log a completed discovery
    pub fn log_discovery(&self, tenants: usize, paths: usize) {
        info!(
            event = "discovery_completed",
            source = %self.source,
            tenants = tenants,
            paths = paths,
            "Enumerated metric paths"
        );
    }

    /// Log a session evicted after the storage service rejected its token
    pub fn log_session_evicted(&self, tenant_id: &str) {
        warn!(
            event = "session_evicted",
            source = %self.source,
            tenant_id = %tenant_id,
            "Dropped cached session after unauthorized response"
        );
    }

    pub fn log_startup(&self, version: &str, identity_endpoint: &str) {
        info!(
            event = "agent_started",
            source = %self.source,
            agent_version = %version,
            identity_endpoint = %identity_endpoint,
            "Cinder collector agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            source = %self.source,
            reason = %reason,
            "Cinder collector agent shutting down"
        );
    }
}
