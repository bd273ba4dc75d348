use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::record::IndexRecord;

/// Files larger than this are demoted after they run.
pub const LARGE_FILE_BYTES: u64 = 10_000_000;

/// What a feedback pass did to a job's level.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Demoted,
    Promoted,
    /// Already at the bound the rule pushed towards.
    Unchanged,
}

impl Adjustment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjustment::Demoted => "demoted",
            Adjustment::Promoted => "promoted",
            Adjustment::Unchanged => "unchanged",
        }
    }
}

/// MLFQ-style priority feedback applied after every run.
///
/// Errors and large files sink one level, anything else rises one level.
/// Levels saturate at `Q0` and `Q3`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FeedbackAdjuster {
    large_file_bytes: u64,
}

impl Default for FeedbackAdjuster {
    fn default() -> Self {
        Self {
            large_file_bytes: LARGE_FILE_BYTES,
        }
    }
}

impl FeedbackAdjuster {
    pub fn new(large_file_bytes: u64) -> Self {
        Self { large_file_bytes }
    }

    pub fn large_file_bytes(&self) -> u64 {
        self.large_file_bytes
    }

    /// Whether `record` warrants a demotion.
    pub fn penalizes(&self, record: &IndexRecord) -> bool {
        record.is_error()
            || record
                .size()
                .is_some_and(|size| size > self.large_file_bytes)
    }

    pub fn apply(&self, job: &mut Job, record: &IndexRecord) -> Adjustment {
        let before = job.queue_level;
        let after = if self.penalizes(record) {
            before.demoted()
        } else {
            before.promoted()
        };
        job.queue_level = after;

        match after.cmp(&before) {
            std::cmp::Ordering::Greater => Adjustment::Demoted,
            std::cmp::Ordering::Less => Adjustment::Promoted,
            std::cmp::Ordering::Equal => Adjustment::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CostBucket, QueueLevel};
    use crate::record::FileFacts;
    use crate::scan::HashAlgorithm;
    use std::path::Path;

    fn record_of_size(size: u64) -> IndexRecord {
        IndexRecord::indexed(
            Path::new("/f"),
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
                hash: "00".into(),
                hash_algorithm: HashAlgorithm::Sha256,
            },
        )
    }

    fn job_at(level: QueueLevel) -> Job {
        let mut job = Job::new("/f", 1, CostBucket::Small);
        job.queue_level = level;
        job
    }

    #[test]
    fn test_error_demotes() {
        let mut job = job_at(QueueLevel::Q1);
        let record = IndexRecord::failed(Path::new("/f"), "PermissionDenied: x");
        let outcome = FeedbackAdjuster::default().apply(&mut job, &record);
        assert_eq!(outcome, Adjustment::Demoted);
        assert_eq!(job.queue_level, QueueLevel::Q2);
    }

    #[test]
    fn test_large_file_demotes_and_caps() {
        let adjuster = FeedbackAdjuster::default();
        let large = record_of_size(15 * 1024 * 1024);

        let mut job = job_at(QueueLevel::Q2);
        assert_eq!(adjuster.apply(&mut job, &large), Adjustment::Demoted);
        assert_eq!(job.queue_level, QueueLevel::Q3);
        assert_eq!(adjuster.apply(&mut job, &large), Adjustment::Unchanged);
        assert_eq!(job.queue_level, QueueLevel::Q3);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let adjuster = FeedbackAdjuster::default();
        let mut job = job_at(QueueLevel::Q2);
        adjuster.apply(&mut job, &record_of_size(LARGE_FILE_BYTES));
        assert_eq!(job.queue_level, QueueLevel::Q1);
    }

    #[test]
    fn test_small_file_promotes_and_floors() {
        let adjuster = FeedbackAdjuster::default();
        let small = record_of_size(1024);

        let mut job = job_at(QueueLevel::Q1);
        assert_eq!(adjuster.apply(&mut job, &small), Adjustment::Promoted);
        assert_eq!(adjuster.apply(&mut job, &small), Adjustment::Unchanged);
        assert_eq!(job.queue_level, QueueLevel::Q0);
    }

    #[test]
    fn test_level_stays_bounded_over_long_sequences() {
        let adjuster = FeedbackAdjuster::new(1_000);
        let mut job = job_at(QueueLevel::Q0);
        let records = [
            record_of_size(10),
            record_of_size(5_000),
            IndexRecord::failed(Path::new("/f"), "NotFound: gone"),
        ];

        // Deterministic but irregular pattern of outcomes.
        for step in 0..500usize {
            let record = &records[(step * 7 + step / 3) % records.len()];
            adjuster.apply(&mut job, record);
            assert!(job.queue_level.as_u8() <= QueueLevel::LOWEST.as_u8());
        }
        for _ in 0..10 {
            adjuster.apply(&mut job, &records[2]);
        }
        assert_eq!(job.queue_level, QueueLevel::Q3);
    }
}
