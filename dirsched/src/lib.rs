//! dirsched - scheduling-policy simulator and parallel indexer for directory trees.
//!
//! Every regular file under a root becomes a job. The crate either replays
//! those jobs through a single-threaded tick loop under a chosen dispatch
//! policy, or fans them out to a pool of workers, and writes one JSON record
//! per indexed file either way.
//!
//! # Core Concepts
//!
//! - **Job**: a [`Job`] is one file plus its arrival order, cost bucket,
//!   remaining work and feedback level.
//!
//! - **Scheduler**: a [`SchedulingPolicy`] resolves to a [`DispatchPolicy`]
//!   (FCFS, round robin or MLFQ) that picks the next job from a [`RunQueue`]
//!   each tick.
//!
//! - **Feedback**: the [`FeedbackAdjuster`] demotes jobs whose files were
//!   large or unreadable and promotes the rest.
//!
//! - **Backends**: [`SharedPool`] and [`IsolatedPool`] implement
//!   [`BatchScanner`]; [`index_batch`] drains either into a [`JsonlSink`].
//!
//! - **Queries**: [`find_larger_than`] and [`checksum_of`] read an index back.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use dirsched::*;
//!
//! let paths = walk::regular_files(root)?;
//! let mut sink = JsonlSink::create(Path::new("index_results_RR_run1.jsonl"))?;
//! let config = SimulationConfig::new(SchedulingPolicy::RoundRobin).with_repeat(10);
//! let summary = run_simulation(&config, &paths, &mut sink)?;
//! println!("{summary}");
//! ```

/// Execution backends and the batch driver.
///
/// - [`BatchScanner`] - the capability both pools implement
/// - [`SharedPool`] - tokio worker tasks over a shared queue
/// - [`IsolatedPool`] - child processes speaking JSON lines
/// - [`index_batch`] - single-writer drain into a sink
pub mod backend;

/// Pool, simulation and file-level settings.
pub mod config;

/// Configuration error taxonomy.
pub mod error;

/// MLFQ-style feedback on job priority.
pub mod feedback;

/// Core job definitions.
///
/// - [`Job`] - mutable per-file scheduling state
/// - [`JobId`] - index of a job in its run
/// - [`CostBucket`] - size-derived work estimate
/// - [`QueueLevel`] - feedback priority (Q0-Q3)
/// - [`JobState`] - job lifecycle states
pub mod job;

#[cfg(feature = "metrics")]
/// Prometheus metrics.
pub mod metrics;

/// Read-only queries over an index file.
pub mod query;

/// The result record written once per indexed file.
pub mod record;

pub mod scan;

/// Dispatch policies and the ready queue.
pub mod scheduler;

/// The tick-driven simulation loop.
pub mod sim;

/// JSON Lines output.
pub mod sink;

pub mod telemetry;

/// Directory enumeration.
pub mod walk;

/// Job construction from a file list.
pub mod workload;

pub use backend::{
    build_scanner, collect_batch, index_batch, BackendKind, BatchReport, BatchScanner,
    IsolatedPool, SharedPool,
};
pub use config::*;
pub use error::ConfigError;
pub use feedback::{Adjustment, FeedbackAdjuster, LARGE_FILE_BYTES};
pub use job::*;
pub use query::{checksum_of, find_larger_than, open_index, IndexEntry};
pub use record::{FileFacts, IndexRecord, ScheduleMeta};
pub use scan::{scan_path, HashAlgorithm};
pub use scheduler::*;
pub use sim::{run_comparison, run_series, run_simulation, RunSummary};
pub use sink::JsonlSink;
pub use workload::{WorkloadBuilder, MAX_WORKLOAD_JOBS};
