use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems, reported before any job runs.
///
/// Per-file failures never surface as a `ConfigError`; they are captured in
/// the `error` field of the affected [`IndexRecord`](crate::IndexRecord).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown scheduling policy `{0}` (expected fcfs, rr or mlfq)")]
    UnknownPolicy(String),

    #[error("unknown backend `{0}` (expected shared or isolated)")]
    UnknownBackend(String),

    #[error(
        "unknown hash algorithm `{0}` (expected sha224, sha256, sha384, sha512 or blake3)"
    )]
    UnknownAlgorithm(String),

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("time quantum must be at least 1")]
    ZeroQuantum,

    #[error("{files} files repeated {repeat} times exceeds the limit of {max} jobs")]
    WorkloadTooLarge {
        files: usize,
        repeat: usize,
        max: usize,
    },

    #[error("failed to read config file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("invalid config file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
