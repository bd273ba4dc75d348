//! Prometheus metrics instrumentation for dirsched.
//!
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `dirsched_dispatches_total` - Dispatches made by the simulation loop
//! - `dirsched_records_total` - Records written, by source and status
//! - `dirsched_feedback_total` - Feedback adjustments, by outcome
//!
//! ## Gauges
//! - `dirsched_ready_queue_depth` - Jobs waiting in the ready queue
//!
//! ## Histograms
//! - `dirsched_scan_duration_seconds` - Time spent indexing one file
#![cfg(feature = "metrics")]

use prometheus::{
    exponential_buckets, CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::sync::LazyLock;

/// Global Prometheus registry for dirsched metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for dispatches.
///
/// Labels:
/// - `scheduler`: FCFS, RR or MLFQ
pub static DISPATCHES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("dirsched_dispatches_total", "Total number of dispatches");
    CounterVec::new(opts, &["scheduler"])
        .expect("dirsched_dispatches_total metric creation failed")
});

/// Counter for written records.
///
/// Labels:
/// - `source`: backend name, or `simulation`
/// - `status`: `indexed` or `error`
pub static RECORDS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("dirsched_records_total", "Total number of records written");
    CounterVec::new(opts, &["source", "status"])
        .expect("dirsched_records_total metric creation failed")
});

/// Counter for feedback adjustments.
///
/// Labels:
/// - `scheduler`: FCFS, RR or MLFQ
/// - `adjustment`: `demoted`, `promoted` or `unchanged`
pub static FEEDBACK_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "dirsched_feedback_total",
        "Total number of feedback adjustments",
    );
    CounterVec::new(opts, &["scheduler", "adjustment"])
        .expect("dirsched_feedback_total metric creation failed")
});

/// Gauge for ready queue depth.
pub static READY_QUEUE_DEPTH: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new("dirsched_ready_queue_depth", "Jobs waiting in the ready queue");
    GaugeVec::new(opts, &["scheduler"])
        .expect("dirsched_ready_queue_depth metric creation failed")
});

/// Histogram for per-file scan duration in seconds.
pub static SCAN_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.0001, 2.0, 16).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "dirsched_scan_duration_seconds",
        "Time spent indexing a single file",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["source"])
        .expect("dirsched_scan_duration_seconds metric creation failed")
});

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(DISPATCHES_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(RECORDS_TOTAL.clone()),
        Box::new(FEEDBACK_TOTAL.clone()),
        Box::new(READY_QUEUE_DEPTH.clone()),
        Box::new(SCAN_DURATION_SECONDS.clone()),
    ] {
        match registry.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

pub fn record_dispatch(scheduler: &str) {
    DISPATCHES_TOTAL.with_label_values(&[scheduler]).inc();
}

pub fn record_indexed(source: &str, status: &str) {
    RECORDS_TOTAL.with_label_values(&[source, status]).inc();
}

pub fn record_feedback(scheduler: &str, adjustment: &str) {
    FEEDBACK_TOTAL
        .with_label_values(&[scheduler, adjustment])
        .inc();
}

pub fn set_ready_queue_depth(scheduler: &str, depth: f64) {
    READY_QUEUE_DEPTH.with_label_values(&[scheduler]).set(depth);
}

pub fn observe_scan_duration(source: &str, duration_secs: f64) {
    SCAN_DURATION_SECONDS
        .with_label_values(&[source])
        .observe(duration_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
