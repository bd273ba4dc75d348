use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

/// Append-only JSON Lines writer.
///
/// Each record is serialized onto its own line and flushed immediately, so a
/// crash loses at most the record being written. The sink never seeks or
/// rewrites; concurrent producers must funnel through a single owner.
pub struct JsonlSink<W: Write> {
    writer: W,
    written: usize,
}

impl JsonlSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.display())
            })?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        tracing::debug!(path = %path.display(), "result sink opened");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Write one record as a line and flush it.
    pub fn write_record<T: Serialize>(&mut self, record: &T) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .context("failed to serialize record")?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().context("failed to flush record")?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> std::fmt::Debug for JsonlSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}
