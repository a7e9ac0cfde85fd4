//! Metrics describing how a [crate::Cache] interacts with its [crate::Source].

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for a [crate::Cache].
///
/// All fields are cheap handles: clones share the same underlying values.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// Number of length requests issued
    pub length_requests: Counter,
    /// Number of range requests issued
    pub range_requests: Counter,
    /// Number of range deliveries applied
    pub deliveries: Counter,
    /// Number of records written to slots
    pub records: Counter,
    /// Number of slots whose content was cleared
    pub invalidations: Counter,
    /// Number of times the expiry marker advanced
    pub expirations: Counter,
    /// Current number of windows with an outstanding request
    pub pending_windows: Gauge,
    /// Current number of materialized slots
    pub slots: Gauge,
}

impl Metrics {
    /// Register all metrics with the given registry.
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "length_requests",
            "Number of length requests issued",
            self.length_requests.clone(),
        );
        registry.register(
            "range_requests",
            "Number of range requests issued",
            self.range_requests.clone(),
        );
        registry.register(
            "deliveries",
            "Number of range deliveries applied",
            self.deliveries.clone(),
        );
        registry.register(
            "records",
            "Number of records written to slots",
            self.records.clone(),
        );
        registry.register(
            "invalidations",
            "Number of slots whose content was cleared",
            self.invalidations.clone(),
        );
        registry.register(
            "expirations",
            "Number of times the expiry marker advanced",
            self.expirations.clone(),
        );
        registry.register(
            "pending_windows",
            "Current number of windows with an outstanding request",
            self.pending_windows.clone(),
        );
        registry.register(
            "slots",
            "Current number of materialized slots",
            self.slots.clone(),
        );
    }
}
