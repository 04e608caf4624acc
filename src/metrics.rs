//! Prometheus metrics for the allocators
//!
//! Collectors are process-wide, like the allocator state they describe.
//! They count even before [`init_metrics`] registers them; registration only
//! makes them visible to [`export_metrics`].

use prometheus::{
    core::{AtomicU64, GenericCounter, GenericGauge},
    Encoder, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref ALLOCATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("memslab_allocations_total", "Chunks handed out, by source"),
        &["path"]
    ).unwrap();

    pub static ref FREES_TOTAL: GenericCounter<AtomicU64> = GenericCounter::new(
        "memslab_frees_total",
        "Chunks freed"
    ).unwrap();

    pub static ref FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("memslab_failures_total", "Refused operations, by reason"),
        &["reason"]
    ).unwrap();

    pub static ref SLABS_ACQUIRED_TOTAL: GenericCounter<AtomicU64> = GenericCounter::new(
        "memslab_slabs_acquired_total",
        "Slabs acquired from the underlying system"
    ).unwrap();

    pub static ref MEMORY_COMMITTED: GenericGauge<AtomicU64> = GenericGauge::new(
        "memslab_memory_committed_bytes",
        "Bytes committed by the most recently updated allocator"
    ).unwrap();
}

/// Register all collectors with [`METRICS_REGISTRY`]
pub fn init_metrics() {
    info!("Initializing Prometheus metrics");

    // Re-registration errors are expected when called twice
    METRICS_REGISTRY.register(Box::new(ALLOCATIONS_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(FREES_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(FAILURES_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(SLABS_ACQUIRED_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(MEMORY_COMMITTED.clone())).ok();
}

pub(crate) fn record_allocation(path: &str) {
    ALLOCATIONS_TOTAL.with_label_values(&[path]).inc();
}

pub(crate) fn record_free() {
    FREES_TOTAL.inc();
}

pub(crate) fn record_failure(reason: &str) {
    FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

pub(crate) fn record_slab(committed: usize) {
    SLABS_ACQUIRED_TOTAL.inc();
    MEMORY_COMMITTED.set(committed as u64);
}

pub(crate) fn record_committed(committed: usize) {
    MEMORY_COMMITTED.set(committed as u64);
}

/// Render registered metrics in the Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_after_init() {
        init_metrics();
        init_metrics();

        record_allocation("bump");
        record_failure("out_of_budget");
        record_slab(1 << 20);

        let text = export_metrics();
        assert!(text.contains("memslab_allocations_total"));
        assert!(text.contains("memslab_failures_total"));
        assert!(text.contains("memslab_slabs_acquired_total"));
        assert!(text.contains("# HELP memslab_frees_total Chunks freed\n"));
    }
}
