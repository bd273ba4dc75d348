use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::worker::WorkRequest;
use super::{BackendKind, BatchScanner};
use crate::config::PoolConfig;
use crate::error::ConfigError;
use crate::record::IndexRecord;
use crate::scan::HashAlgorithm;
use crate::telemetry;

/// Subcommand the child process is started with.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Process pool: N child processes, each fed a round-robin share of paths.
///
/// Records are forwarded as they arrive, so the output is in completion
/// order across workers and submission order within one worker. Paths a
/// worker never answers (because it crashed or rejected the request) are
/// reported as error records once that worker exits.
#[derive(Clone, Debug)]
pub struct IsolatedPool {
    config: PoolConfig,
}

impl IsolatedPool {
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn program(&self) -> anyhow::Result<PathBuf> {
        match &self.config.worker_program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().context("cannot locate worker executable"),
        }
    }

    /// Split `paths` into per-worker shares, path `i` going to worker `i % n`.
    fn shares(paths: Vec<PathBuf>, workers: usize) -> Vec<Vec<PathBuf>> {
        let mut shares = vec![Vec::new(); workers];
        for (i, path) in paths.into_iter().enumerate() {
            shares[i % workers].push(path);
        }
        shares
    }
}

async fn send(tx: &mpsc::Sender<IndexRecord>, record: IndexRecord) -> bool {
    tx.send(record.with_backend(BackendKind::IsolatedPool))
        .await
        .is_ok()
}

async fn run_child(
    worker_id: String,
    program: PathBuf,
    algorithm: HashAlgorithm,
    share: Vec<PathBuf>,
    tx: mpsc::Sender<IndexRecord>,
) -> anyhow::Result<usize> {
    let mut sent = 0;
    let mut payload = String::new();
    let mut pending = VecDeque::with_capacity(share.len());

    for path in share {
        let request = WorkRequest::for_path(&path);
        payload.push_str(&serde_json::to_string(&request).context("failed to encode request")?);
        payload.push('\n');
        pending.push_back((path, request));
    }

    if pending.is_empty() {
        return Ok(sent);
    }

    let mut child = Command::new(&program)
        .arg(WORKER_SUBCOMMAND)
        .arg("--algorithm")
        .arg(algorithm.as_str())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn worker {}", program.display()))?;
    tracing::debug!(worker_id = %worker_id, pid = child.id(), paths = pending.len(), "worker spawned");

    let mut stdin = child.stdin.take().context("worker stdin not captured")?;
    let stdout = child.stdout.take().context("worker stdout not captured")?;

    // Feed requests from a separate task so a full stdout pipe cannot
    // deadlock against a full stdin pipe.
    let feeder = tokio::spawn(async move {
        stdin.write_all(payload.as_bytes()).await?;
        stdin.shutdown().await
    });

    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(worker_id = %worker_id, error = %err, "worker output unreadable");
                break;
            }
        };
        let record: IndexRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(worker_id = %worker_id, error = %err, "skipping malformed reply");
                continue;
            }
        };

        let Some(pos) = pending.iter().position(|(_, request)| {
            request.path == record.path && request.path_bytes == record.path_bytes
        }) else {
            tracing::warn!(worker_id = %worker_id, path = %record.path, "reply for unknown path");
            continue;
        };
        pending.remove(pos);
        if !send(&tx, record).await {
            tracing::warn!(worker_id = %worker_id, "record receiver dropped");
            return Ok(sent);
        }
        sent += 1;
    }

    match feeder.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!(worker_id = %worker_id, error = %err, "worker stopped reading"),
        Err(err) => tracing::warn!(worker_id = %worker_id, "request feeder failed: {err}"),
    }
    let status = child.wait().await.context("failed to wait for worker")?;

    if !pending.is_empty() {
        tracing::warn!(
            worker_id = %worker_id,
            status = %status,
            unanswered = pending.len(),
            "worker exited before answering every path"
        );
    }
    for (path, _) in pending {
        let record = IndexRecord::failed(
            &path,
            format!("BrokenPipe: worker exited ({status}) before answering"),
        );
        if !send(&tx, record).await {
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

#[async_trait]
impl BatchScanner for IsolatedPool {
    fn kind(&self) -> BackendKind {
        BackendKind::IsolatedPool
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
        if paths.is_empty() {
            return Ok(0);
        }
        let program = self.program()?;
        let workers = self.config.workers.min(paths.len());
        let pool = format!("isolated-{}", std::process::id());

        let mut handles = Vec::with_capacity(workers);
        for (i, share) in Self::shares(paths, workers).into_iter().enumerate() {
            let worker_id = format!("{pool}-w{i}");
            let span = telemetry::worker_span(BackendKind::IsolatedPool, &worker_id);
            handles.push(tokio::spawn(
                run_child(worker_id, program.clone(), algorithm, share, tx.clone())
                    .instrument(span),
            ));
        }
        drop(tx);

        let mut sent = 0;
        for joined in join_all(handles).await {
            sent += joined.context("isolated pool worker task panicked")??;
        }
        Ok(sent)
    }
}
