//! Line protocol spoken between the isolated pool and its child processes.
//!
//! The coordinator writes one [`WorkRequest`] per line to the child's stdin
//! and closes it. The child answers each request, in order, with one
//! [`IndexRecord`](crate::IndexRecord) per line on stdout and exits at end of input.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::record::{path_bytes, path_from_parts, path_label};
use crate::scan::{scan_path, HashAlgorithm};

/// A single path to index.
///
/// Uses the same `path` / `path_bytes` pair as [`IndexRecord`](crate::IndexRecord),
/// so a reply can be matched to its request by comparing the two fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_bytes: Option<Vec<u8>>,
}

impl WorkRequest {
    pub fn for_path(path: &Path) -> Self {
        Self {
            path: path_label(path.as_os_str()),
            path_bytes: path_bytes(path),
        }
    }

    pub fn to_path(&self) -> PathBuf {
        path_from_parts(&self.path, self.path_bytes.as_deref())
    }
}

/// Serve requests from `input` until end of input.
///
/// Returns the number of records written. Lines that do not parse as a
/// request are logged and skipped; the coordinator reports those paths as
/// unanswered.
pub fn run_worker<R, W>(
    algorithm: HashAlgorithm,
    input: R,
    mut output: W,
) -> anyhow::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let mut answered = 0;
    for line in input.lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let request: WorkRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed request");
                continue;
            }
        };

        let record = scan_path(&request.to_path(), algorithm);
        serde_json::to_writer(&mut output, &record)
            .context("failed to encode record")?;
        output.write_all(b"\n")?;
        output.flush().context("failed to flush record")?;
        answered += 1;
    }
    tracing::debug!(answered, "worker input exhausted");
    Ok(answered)
}
