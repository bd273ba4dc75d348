use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;

use super::{BackendKind, BatchScanner};
use crate::config::PoolConfig;
use crate::error::ConfigError;
use crate::record::IndexRecord;
use crate::scan::{scan_path, HashAlgorithm};
use crate::telemetry;

type WorkQueue = Arc<Mutex<VecDeque<PathBuf>>>;

/// In-process pool: N tokio tasks pull paths from one shared queue.
///
/// Hashing runs on the blocking thread pool. Records are sent in
/// completion order.
#[derive(Clone, Debug)]
pub struct SharedPool {
    config: PoolConfig,
}

impl SharedPool {
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    async fn worker_loop(
        worker_id: String,
        queue: WorkQueue,
        algorithm: HashAlgorithm,
        tx: mpsc::Sender<IndexRecord>,
    ) -> usize {
        let mut sent = 0;
        loop {
            let next = queue.lock().await.pop_front();
            let Some(path) = next else {
                tracing::debug!(worker_id = %worker_id, sent, "queue drained");
                break;
            };

            let timer = telemetry::start_scan(&path);
            let scanned = tokio::task::spawn_blocking({
                let path = path.clone();
                move || scan_path(&path, algorithm)
            })
            .await;
            let record = match scanned {
                Ok(record) => record,
                Err(err) => {
                    tracing::error!(
                        worker_id = %worker_id,
                        path = %path.display(),
                        "scan task failed: {err}"
                    );
                    IndexRecord::failed(&path, format!("Other: scan task failed: {err}"))
                }
            };
            telemetry::finish_scan(timer, BackendKind::SharedPool.as_str());

            if tx
                .send(record.with_backend(BackendKind::SharedPool))
                .await
                .is_err()
            {
                tracing::warn!(worker_id = %worker_id, "record receiver dropped");
                break;
            }
            sent += 1;
        }
        sent
    }
}

#[async_trait]
impl BatchScanner for SharedPool {
    fn kind(&self) -> BackendKind {
        BackendKind::SharedPool
    }

    fn channel_capacity(&self) -> usize {
        self.config.channel_capacity
    }

    async fn scan(
        &self,
        paths: Vec<PathBuf>,
        algorithm: HashAlgorithm,
        tx: mpsc::Sender<IndexRecord>,
    ) -> anyhow::Result<usize> {
        let workers = self.config.workers.min(paths.len()).max(1);
        let queue: WorkQueue = Arc::new(Mutex::new(paths.into()));
        let pool = format!("shared-{}", std::process::id());

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let worker_id = format!("{pool}-w{i}");
            let span = telemetry::worker_span(BackendKind::SharedPool, &worker_id);
            let q = Arc::clone(&queue);
            let tx = tx.clone();
            handles.push(tokio::spawn(
                Self::worker_loop(worker_id, q, algorithm, tx).instrument(span),
            ));
        }
        drop(tx);

        let mut sent = 0;
        for joined in join_all(handles).await {
            sent += joined.context("shared pool worker panicked")?;
        }
        Ok(sent)
    }
}
