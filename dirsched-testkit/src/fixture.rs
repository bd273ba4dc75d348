use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory tree populated with files of known sizes.
///
/// The tree is removed when the fixture is dropped.
pub struct TreeFixture {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl TreeFixture {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            files: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Paths of every file written so far, in creation order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write `size` bytes of a repeating pattern to `relative`.
    pub fn file(&mut self, relative: &str, size: usize) -> anyhow::Result<PathBuf> {
        let contents: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        self.file_with(relative, &contents)
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn file_with(&mut self, relative: &str, contents: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        self.files.push(path.clone());
        Ok(path)
    }

    /// Write `count` small files named `file-<i>.txt`.
    pub fn many(&mut self, count: usize) -> anyhow::Result<Vec<PathBuf>> {
        (0..count)
            .map(|i| self.file(&format!("file-{i:03}.txt"), 64 + i * 31))
            .collect()
    }

    /// Delete a file that was already handed out, so scanning it fails.
    pub fn vanish(&self, relative: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(relative);
        std::fs::remove_file(&path)?;
        Ok(path)
    }
}
