use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dirsched::{BackendKind, BatchScanner, FileFacts, HashAlgorithm, IndexRecord};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One call made to a [`MockScanner`].
#[derive(Clone, Debug)]
pub struct ScanCall {
    pub paths: Vec<PathBuf>,
    pub algorithm: HashAlgorithm,
}

/// A [`BatchScanner`] that fabricates records without touching the disk.
///
/// Paths marked failing produce error records; all others report the size
/// registered for them (0 by default) and a placeholder hash.
#[derive(Clone)]
pub struct MockScanner {
    kind: BackendKind,
    calls: Arc<Mutex<Vec<ScanCall>>>,
    sizes: Arc<Mutex<HashMap<PathBuf, u64>>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MockScanner {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            calls: Arc::new(Mutex::new(Vec::new())),
            sizes: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_size(self, path: impl Into<PathBuf>, size: u64) -> Self {
        self.sizes.lock().insert(path.into(), size);
        self
    }

    pub fn with_failure(self, path: impl Into<PathBuf>) -> Self {
        self.failing.lock().insert(path.into());
        self
    }

    pub fn calls(&self) -> Vec<ScanCall> {
        self.calls.lock().clone()
    }

    pub fn assert_call_count_eq(&self, expected: usize) {
        let actual = self.calls.lock().len();
        assert_eq!(
            actual, expected,
            "Expected {} scan calls, got {}",
            expected, actual
        );
    }

    fn fabricate(&self, path: &PathBuf, algorithm: HashAlgorithm) -> IndexRecord {
        if self.failing.lock().contains(path) {
            return IndexRecord::failed(path, "PermissionDenied: mock failure");
        }
        let size = self.sizes.lock().get(path).copied().unwrap_or_default();
        IndexRecord::indexed(
            path,
            FileFacts {
                size,
                mtime: 0.0,
                atime: 0.0,
                ctime: 0.0,
                owner: None,
                gid: None,
                mode: None,
                extension: String::new(),
                mime_guess: None,
                is_symlink: false,
                hash: format!("mock-{size}"),
                hash_algorithm: algorithm,
            },
        )
    }
}

#[async_trait]
impl BatchScanner for MockScanner {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn scan(
        &self,
        paths: Vec<PathBuf>,
        algorithm: HashAlgorithm,
        tx: mpsc::Sender<IndexRecord>,
    ) -> anyhow::Result<usize> {
        self.calls.lock().push(ScanCall {
            paths: paths.clone(),
            algorithm,
        });
        let mut sent = 0;
        for path in &paths {
            let record = self.fabricate(path, algorithm).with_backend(self.kind);
            if tx.send(record).await.is_err() {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }
}
