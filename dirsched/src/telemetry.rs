//! Tracing and telemetry instrumentation for dirsched.
//!
//! Span constructors and `record_*` helpers used by the simulation loop and
//! the execution backends. Every helper logs through `tracing`; with the
//! `metrics` feature enabled it also updates the Prometheus collectors in
//! [`crate::metrics`].
//!
//! # Example
//!
//! ```ignore
//! use dirsched::telemetry::{dispatch_span, record_dispatch};
//!
//! let span = dispatch_span("RR", job_id, tick);
//! let _enter = span.enter();
//! record_dispatch("RR", job_id, tick, false);
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info_span, Span};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

use crate::backend::BackendKind;
use crate::feedback::Adjustment;
use crate::job::{JobId, Tick};
use crate::record::IndexRecord;

/// Environment variable holding the log filter directives.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Install the global subscriber: human-readable output on stderr, filtered
/// by `LOG_LEVEL` (default `info`).
///
/// Stdout is left alone because query results and the worker protocol use it.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var(LOG_LEVEL_ENV)
                .from_env_lossy(),
        )
        .try_init()?;
    Ok(())
}

/// Create a tracing span for one simulation dispatch.
#[must_use]
pub fn dispatch_span(scheduler: impl AsRef<str>, job: JobId, tick: Tick) -> Span {
    info_span!(
        "dirsched.dispatch",
        scheduler = %scheduler.as_ref(),
        job_id = %job,
        tick = tick,
    )
}

/// Create a tracing span covering one backend batch.
#[must_use]
pub fn batch_span(batch_id: Uuid, backend: BackendKind) -> Span {
    info_span!(
        "dirsched.batch",
        batch_id = %batch_id,
        backend = %backend,
    )
}

/// Create a tracing span for a single pool worker.
#[must_use]
pub fn worker_span(backend: BackendKind, worker_id: impl AsRef<str>) -> Span {
    info_span!(
        "dirsched.worker",
        backend = %backend,
        worker_id = %worker_id.as_ref(),
    )
}

/// Record one dispatch made by the simulation loop.
pub fn record_dispatch(scheduler: &str, job: JobId, tick: Tick, completed: bool) {
    tracing::debug!(
        scheduler = scheduler,
        job_id = %job,
        tick = tick,
        completed = completed,
        "job dispatched"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_dispatch(scheduler);
}

/// Record what the feedback rule did after a dispatch.
pub fn record_feedback(scheduler: &str, job: JobId, adjustment: Adjustment) {
    tracing::trace!(
        scheduler = scheduler,
        job_id = %job,
        adjustment = adjustment.as_str(),
        "feedback applied"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_feedback(scheduler, adjustment.as_str());
}

/// Record a record written to a sink.
///
/// `source` is the backend name, or `simulation` for the tick loop.
pub fn record_indexed(source: &str, record: &IndexRecord) {
    match &record.error {
        Some(error) => tracing::debug!(
            source = source,
            path = %record.path,
            error = %error,
            "file not indexed"
        ),
        None => tracing::trace!(source = source, path = %record.path, "file indexed"),
    }

    #[cfg(feature = "metrics")]
    crate::metrics::record_indexed(source, record.status());
}

/// Update the ready queue depth for a scheduler.
pub fn set_ready_queue_depth(scheduler: &str, depth: usize) {
    tracing::trace!(scheduler = scheduler, depth = depth, "ready queue depth");

    #[cfg(feature = "metrics")]
    crate::metrics::set_ready_queue_depth(scheduler, depth as f64);
}

/// Start timing a single file scan.
pub fn start_scan(path: &Path) -> ScanTimingHandle {
    ScanTimingHandle {
        path: path.display().to_string(),
        start: Instant::now(),
    }
}

/// Finish timing a scan and observe its duration.
pub fn finish_scan(handle: ScanTimingHandle, source: &str) -> Duration {
    let elapsed = handle.start.elapsed();
    tracing::trace!(
        source = source,
        path = %handle.path,
        duration_secs = elapsed.as_secs_f64(),
        "scan finished"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::observe_scan_duration(source, elapsed.as_secs_f64());

    elapsed
}

/// Handle returned by [`start_scan`] and consumed by [`finish_scan`].
#[derive(Debug)]
pub struct ScanTimingHandle {
    path: String,
    start: Instant,
}

impl ScanTimingHandle {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
