//! Batch execution backends.
//!
//! A backend takes a flat list of paths and produces exactly one
//! [`IndexRecord`] per path, sending each through a channel as soon as it
//! is ready. [`index_batch`] is the single consumer that drains that channel
//! into a [`JsonlSink`].

mod isolated;
mod shared;
pub mod worker;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{PoolConfig, DEFAULT_CHANNEL_CAPACITY};
use crate::error::ConfigError;
use crate::record::IndexRecord;
use crate::scan::HashAlgorithm;
use crate::sink::JsonlSink;
use crate::telemetry;

pub use isolated::IsolatedPool;
pub use shared::SharedPool;

/// Which backend produced a record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum BackendKind {
    /// Worker tasks inside this process.
    SharedPool,
    /// Worker child processes speaking JSON lines.
    IsolatedPool,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::SharedPool => "shared_pool",
            BackendKind::IsolatedPool => "isolated_pool",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "shared" | "shared_pool" | "threads" => Ok(BackendKind::SharedPool),
            "isolated" | "isolated_pool" | "processes" => Ok(BackendKind::IsolatedPool),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A pool that indexes a batch of paths in parallel.
#[async_trait]
pub trait BatchScanner: Send + Sync {
    /// Tag written to the `backend` field of produced records.
    fn kind(&self) -> BackendKind;

    /// Capacity of the channel [`index_batch`] creates for this backend.
    fn channel_capacity(&self) -> usize {
        DEFAULT_CHANNEL_CAPACITY
    }

    /// Scan every path, sending one record per path to `tx`.
    ///
    /// Returns the number of records sent. Per-file failures are sent as
    /// error records; an `Err` means the pool itself broke.
    async fn scan(
        &self,
        paths: Vec<PathBuf>,
        algorithm: HashAlgorithm,
        tx: mpsc::Sender<IndexRecord>,
    ) -> anyhow::Result<usize>;
}

/// Build the backend named by `kind`.
pub fn build_scanner(
    kind: BackendKind,
    config: PoolConfig,
) -> Result<Box<dyn BatchScanner>, ConfigError> {
    Ok(match kind {
        BackendKind::SharedPool => Box::new(SharedPool::new(config)?),
        BackendKind::IsolatedPool => Box::new(IsolatedPool::new(config)?),
    })
}

/// Outcome of one [`index_batch`] call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub backend: BackendKind,
    pub records: usize,
    pub errors: usize,
    pub elapsed_sec: f64,
}

/// Run `scanner` over `paths` and write every record to `sink` as it arrives.
pub async fn index_batch<W: Write>(
    scanner: &dyn BatchScanner,
    paths: Vec<PathBuf>,
    algorithm: HashAlgorithm,
    sink: &mut JsonlSink<W>,
) -> anyhow::Result<BatchReport> {
    let batch_id = Uuid::now_v7();
    let started_at = Utc::now();
    let backend = scanner.kind();
    let span = telemetry::batch_span(batch_id, backend);
    let started = Instant::now();
    let submitted = paths.len();

    let (tx, mut rx) = mpsc::channel(scanner.channel_capacity().max(1));

    let drain = async move {
        let mut records = 0usize;
        let mut errors = 0usize;
        while let Some(record) = rx.recv().await {
            sink.write_record(&record)?;
            telemetry::record_indexed(backend.as_str(), &record);
            records += 1;
            if record.is_error() {
                errors += 1;
            }
        }
        anyhow::Ok((records, errors))
    };

    let (sent, drained) = async {
        tracing::info!(files = submitted, algorithm = %algorithm, "batch started");
        tokio::join!(scanner.scan(paths, algorithm, tx), drain)
    }
    .instrument(span.clone())
    .await;

    let (records, errors) = drained?;
    let sent = sent?;
    if sent != records || records != submitted {
        tracing::warn!(
            parent: &span,
            submitted,
            sent,
            records,
            "record count does not match submitted paths"
        );
    }

    let report = BatchReport {
        batch_id,
        started_at,
        backend,
        records,
        errors,
        elapsed_sec: started.elapsed().as_secs_f64(),
    };
    tracing::info!(
        parent: &span,
        records = report.records,
        errors = report.errors,
        elapsed_sec = report.elapsed_sec,
        "batch finished"
    );
    Ok(report)
}

/// Scan `paths` and collect the records in arrival order.
pub async fn collect_batch(
    scanner: &dyn BatchScanner,
    paths: Vec<PathBuf>,
    algorithm: HashAlgorithm,
) -> anyhow::Result<Vec<IndexRecord>> {
    let (tx, mut rx) = mpsc::channel(scanner.channel_capacity().max(1));
    let collect = async move {
        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }
        records
    };
    let (sent, records) = tokio::join!(scanner.scan(paths, algorithm, tx), collect);
    sent?;
    Ok(records)
}
