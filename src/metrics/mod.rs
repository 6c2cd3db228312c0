mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

use crate::coordinator::{CacheLookup, OutcomeSink, SoftFailure};
use crate::utils::CircuitState;

pub use server::{health_handler, metrics_handler};

// ============================================================================
// Metrics
// ============================================================================
//
// - order throughput and request latency
// - cache hit / miss / error ratio and write failures
// - store failures per operation
// - notification delivery and publisher circuit state
//
// Also the production outcome sink: every absorbed failure is logged at WARN
// and counted here.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub request_duration: HistogramVec,

    pub cache_lookups: IntCounterVec,
    pub cache_write_failures: IntCounter,

    pub store_failures: IntCounterVec,

    pub notifications: IntCounterVec,
    pub circuit_state: IntGauge,
    pub circuit_transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created =
            IntCounter::new("orders_created_total", "Total orders persisted")?;
        registry.register(Box::new(orders_created.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("order_request_duration_seconds", "Order request duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("cache_lookups_total", "Cache lookups by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_write_failures = IntCounter::new(
            "cache_write_failures_total",
            "Cache writes that failed and were skipped",
        )?;
        registry.register(Box::new(cache_write_failures.clone()))?;

        let store_failures = IntCounterVec::new(
            Opts::new("store_failures_total", "Durable store failures by operation"),
            &["operation"],
        )?;
        registry.register(Box::new(store_failures.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Order notifications by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let circuit_state = IntGauge::new(
            "publisher_circuit_state",
            "Publisher circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_state.clone()))?;

        let circuit_transitions = IntCounterVec::new(
            Opts::new(
                "publisher_circuit_transitions_total",
                "Publisher circuit breaker state transitions",
            ),
            &["from", "to"],
        )?;
        registry.register(Box::new(circuit_transitions.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            request_duration,
            cache_lookups,
            cache_write_failures,
            store_failures,
            notifications,
            circuit_state,
            circuit_transitions,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn set_circuit_state(&self, state: CircuitState) {
        self.circuit_state.set(state.as_gauge());
    }

    pub fn record_circuit_transition(&self, from: CircuitState, to: CircuitState) {
        self.circuit_transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
        self.set_circuit_state(to);
    }

    pub fn observe_request(&self, operation: &str, duration_secs: f64) {
        self.request_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

impl OutcomeSink for Metrics {
    fn soft_failure(&self, failure: SoftFailure) {
        let kind = failure.kind();
        match &failure {
            SoftFailure::CacheRead { key, error } => {
                tracing::warn!(kind, key = %key, error = %error, "Cache read failed, falling back to store");
                self.cache_lookups.with_label_values(&["error"]).inc();
            }
            SoftFailure::CacheWrite { key, error } => {
                tracing::warn!(kind, key = %key, error = %error, "Cache write failed");
                self.cache_write_failures.inc();
            }
            SoftFailure::Publish {
                topic,
                order_id,
                error,
            } => {
                tracing::warn!(kind, topic = %topic, order_id = order_id, error = %error, "Order notification not delivered");
                self.notifications.with_label_values(&["failed"]).inc();
            }
        }
    }

    fn cache_lookup(&self, outcome: CacheLookup) {
        let label = match outcome {
            CacheLookup::Hit => "hit",
            CacheLookup::Miss => "miss",
        };
        self.cache_lookups.with_label_values(&[label]).inc();
    }

    fn store_failure(&self, operation: &'static str) {
        self.store_failures.with_label_values(&[operation]).inc();
    }

    fn order_created(&self, _order_id: i64) {
        self.orders_created.inc();
    }

    fn published(&self, _order_id: i64) {
        self.notifications.with_label_values(&["delivered"]).inc();
    }
}
