use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// The fields of an index record the queries look at.
///
/// Everything else in the line is ignored, so indexes written by either
/// backend or by a simulation run can be queried alike.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Open an index file for querying.
pub fn open_index(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open index {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Parse every well-formed line of an index; malformed lines are logged.
pub fn entries<R: BufRead>(index: R) -> impl Iterator<Item = anyhow::Result<IndexEntry>> {
    index
        .lines()
        .enumerate()
        .filter_map(|(n, line)| match line {
            Err(err) => Some(Err(anyhow::Error::new(err).context("failed to read index"))),
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => match serde_json::from_str::<IndexEntry>(&line) {
                Ok(entry) => Some(Ok(entry)),
                Err(err) => {
                    tracing::warn!(line = n + 1, error = %err, "skipping malformed index line");
                    None
                }
            },
        })
}

/// Entries whose `size` exceeds `threshold_mb` mebibytes.
pub fn find_larger_than<R: BufRead>(
    index: R,
    threshold_mb: u64,
) -> anyhow::Result<Vec<IndexEntry>> {
    let threshold = threshold_mb.saturating_mul(BYTES_PER_MB);
    let mut found = Vec::new();
    for entry in entries(index) {
        let entry = entry?;
        if entry.size.is_some_and(|size| size > threshold) {
            found.push(entry);
        }
    }
    Ok(found)
}

/// Stored hash of the first entry named `filename`.
pub fn checksum_of<R: BufRead>(index: R, filename: &str) -> anyhow::Result<Option<String>> {
    for entry in entries(index) {
        let entry = entry?;
        if entry.name == filename {
            if let Some(hash) = entry.hash {
                return Ok(Some(hash));
            }
        }
    }
    Ok(None)
}
