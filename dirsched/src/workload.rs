use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::job::{Arrival, CostBucket, Job};

/// Upper bound on the jobs one run may hold (files times repeat).
pub const MAX_WORKLOAD_JOBS: usize = 10_000_000;

/// Turns a file enumeration into the ordered job list a run starts from.
///
/// Arrival is a counter over the enumeration, not wall-clock time, so any
/// fairness claim only holds relative to the order the paths were given in.
#[derive(Clone, Debug)]
pub struct WorkloadBuilder {
    repeat: usize,
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        Self { repeat: 1 }
    }
}

impl WorkloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the whole enumeration `repeat` times.
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Number of jobs `files` paths expand to, or an error when that exceeds
    /// [`MAX_WORKLOAD_JOBS`].
    pub fn job_count(&self, files: usize) -> Result<usize, ConfigError> {
        files
            .checked_mul(self.repeat)
            .filter(|&jobs| jobs <= MAX_WORKLOAD_JOBS)
            .ok_or(ConfigError::WorkloadTooLarge {
                files,
                repeat: self.repeat,
                max: MAX_WORKLOAD_JOBS,
            })
    }

    /// Build jobs, probing each file's size on disk for its cost bucket.
    pub fn build(&self, paths: &[PathBuf]) -> Result<Vec<Job>, ConfigError> {
        self.build_with(paths, probe_size)
    }

    /// Build jobs with a caller-supplied size probe.
    ///
    /// A probe returning `None` puts the job in the lowest cost bucket.
    pub fn build_with<F>(
        &self,
        paths: &[PathBuf],
        mut probe: F,
    ) -> Result<Vec<Job>, ConfigError>
    where
        F: FnMut(&Path) -> Option<u64>,
    {
        let mut jobs = Vec::with_capacity(self.job_count(paths.len())?);
        let mut arrival: Arrival = 0;

        for _ in 0..self.repeat {
            for path in paths {
                arrival += 1;
                let cost = probe(path)
                    .map(CostBucket::from_size)
                    .unwrap_or(CostBucket::Small);
                jobs.push(Job::new(path.clone(), arrival, cost));
            }
        }

        tracing::debug!(
            files = paths.len(),
            repeat = self.repeat,
            jobs = jobs.len(),
            "workload built"
        );
        Ok(jobs)
    }
}

fn probe_size(path: &Path) -> Option<u64> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => Some(meta.len()),
        Err(err) => {
            tracing::debug!(
                path = %path.display(),
                error = %err,
                "size probe failed, assuming smallest cost"
            );
            None
        }
    }
}
