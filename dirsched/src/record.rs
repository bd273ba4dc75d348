use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::backend::BackendKind;
use crate::job::{Arrival, CostBucket, Job, QueueLevel, Tick};
use crate::scan::HashAlgorithm;

/// One logged outcome of indexing a single file.
///
/// Serialized as a single flat JSON object. A record carries either
/// [`FileFacts`] or an `error`, never both.
///
/// `path` is the path as text, with bytes that are not UTF-8 written as
/// `\xNN`. Such paths also carry their raw bytes in `path_bytes`, which is
/// what identifies the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_bytes: Option<Vec<u8>>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleMeta>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub facts: Option<FileFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metadata and digest gathered for a readable file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileFacts {
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: f64,
    pub atime: f64,
    /// Inode change time on Unix, creation time elsewhere.
    pub ctime: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default)]
    pub extension: String,
    /// Content type sniffed from the file's leading bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_guess: Option<String>,
    #[serde(default)]
    pub is_symlink: bool,
    pub hash: String,
    pub hash_algorithm: HashAlgorithm,
}

/// Scheduling state of the job at the tick it ran.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMeta {
    pub scheduler: String,
    pub run_id: u32,
    pub arrival: Arrival,
    pub est_cost: CostBucket,
    pub queue_level: QueueLevel,
    pub tick_ran: Tick,
    pub remaining: i64,
}

impl ScheduleMeta {
    pub fn capture(
        job: &Job,
        scheduler: impl Into<String>,
        run_id: u32,
        tick: Tick,
    ) -> Self {
        Self {
            scheduler: scheduler.into(),
            run_id,
            arrival: job.arrival(),
            est_cost: job.est_cost(),
            queue_level: job.queue_level,
            tick_ran: tick,
            remaining: job.remaining,
        }
    }
}

impl IndexRecord {
    pub fn indexed(path: &Path, facts: FileFacts) -> Self {
        Self {
            path: path_label(path.as_os_str()),
            path_bytes: path_bytes(path),
            name: file_name(path),
            backend: None,
            schedule: None,
            facts: Some(facts),
            error: None,
        }
    }

    pub fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            path: path_label(path.as_os_str()),
            path_bytes: path_bytes(path),
            name: file_name(path),
            backend: None,
            schedule: None,
            facts: None,
            error: Some(error.into()),
        }
    }

    /// The file this record describes.
    pub fn source_path(&self) -> PathBuf {
        path_from_parts(&self.path, self.path_bytes.as_deref())
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleMeta) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// File size, absent for error records.
    pub fn size(&self) -> Option<u64> {
        self.facts.as_ref().map(|facts| facts.size)
    }

    pub fn hash(&self) -> Option<&str> {
        self.facts.as_ref().map(|facts| facts.hash.as_str())
    }

    pub fn status(&self) -> &'static str {
        if self.is_error() {
            "error"
        } else {
            "indexed"
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(path_label).unwrap_or_default()
}

/// Render `text` as UTF-8, escaping every byte that is not valid UTF-8 as
/// `\xNN`.
pub fn path_label(text: &OsStr) -> String {
    if let Some(valid) = text.to_str() {
        return valid.to_string();
    }
    let bytes = text.as_encoded_bytes();
    let mut label = String::with_capacity(bytes.len() + 8);
    for chunk in bytes.utf8_chunks() {
        label.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(label, "\\x{byte:02x}");
        }
    }
    label
}

/// Raw bytes of a path that is not valid UTF-8, `None` otherwise.
#[cfg(unix)]
pub fn path_bytes(path: &Path) -> Option<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    match path.to_str() {
        Some(_) => None,
        None => Some(path.as_os_str().as_bytes().to_vec()),
    }
}

#[cfg(not(unix))]
pub fn path_bytes(_path: &Path) -> Option<Vec<u8>> {
    None
}

/// Rebuild a path from its text and, when present, its raw bytes.
#[cfg(unix)]
pub fn path_from_parts(text: &str, bytes: Option<&[u8]>) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    match bytes {
        Some(bytes) => PathBuf::from(OsStr::from_bytes(bytes)),
        None => PathBuf::from(text),
    }
}

#[cfg(not(unix))]
pub fn path_from_parts(text: &str, _bytes: Option<&[u8]>) -> PathBuf {
    PathBuf::from(text)
}
