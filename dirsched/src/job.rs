use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Files smaller than this land in [`CostBucket::Small`].
pub const SMALL_FILE_BYTES: u64 = 100_000;

/// Files smaller than this (and not small) land in [`CostBucket::Medium`].
pub const MEDIUM_FILE_BYTES: u64 = 10_000_000;

/// Arrival stamp assigned by the workload builder. Counts from 1.
pub type Arrival = u64;

/// One discrete step of the simulated scheduler loop.
pub type Tick = u64;

/// Index of a job inside the simulation's job table.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub struct JobId(pub usize);

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Estimated cost of indexing a file, bucketed by size.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum CostBucket {
    Small = 1,
    Medium = 2,
    Large = 3,
}

impl CostBucket {
    pub fn from_size(size: u64) -> Self {
        if size < SMALL_FILE_BYTES {
            CostBucket::Small
        } else if size < MEDIUM_FILE_BYTES {
            CostBucket::Medium
        } else {
            CostBucket::Large
        }
    }

    /// Work units a job of this cost needs under a preemptive policy.
    pub fn units(self) -> i64 {
        self as u8 as i64
    }
}

impl From<CostBucket> for u8 {
    fn from(value: CostBucket) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for CostBucket {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CostBucket::Small),
            2 => Ok(CostBucket::Medium),
            3 => Ok(CostBucket::Large),
            other => Err(format!("cost bucket out of range: {other}")),
        }
    }
}

/// Feedback queue level. `Q0` is the highest priority.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord,
    Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum QueueLevel {
    #[default]
    Q0 = 0,
    Q1 = 1,
    Q2 = 2,
    Q3 = 3,
}

impl QueueLevel {
    pub const LOWEST: QueueLevel = QueueLevel::Q3;
    pub const HIGHEST: QueueLevel = QueueLevel::Q0;

    /// One level lower in priority, saturating at [`QueueLevel::LOWEST`].
    pub fn demoted(self) -> Self {
        match self {
            QueueLevel::Q0 => QueueLevel::Q1,
            QueueLevel::Q1 => QueueLevel::Q2,
            QueueLevel::Q2 | QueueLevel::Q3 => QueueLevel::Q3,
        }
    }

    /// One level higher in priority, saturating at [`QueueLevel::HIGHEST`].
    pub fn promoted(self) -> Self {
        match self {
            QueueLevel::Q0 | QueueLevel::Q1 => QueueLevel::Q0,
            QueueLevel::Q2 => QueueLevel::Q1,
            QueueLevel::Q3 => QueueLevel::Q2,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<QueueLevel> for u8 {
    fn from(value: QueueLevel) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for QueueLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QueueLevel::Q0),
            1 => Ok(QueueLevel::Q1),
            2 => Ok(QueueLevel::Q2),
            3 => Ok(QueueLevel::Q3),
            other => Err(format!("queue level out of range: {other}")),
        }
    }
}

impl Display for QueueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Q{}", self.as_u8())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Complete,
}

/// A single file to index, plus its scheduling state.
///
/// `path`, `arrival` and `est_cost` are fixed at creation. `remaining` is
/// consumed by preemptive policies and `queue_level` is only touched by the
/// [`FeedbackAdjuster`](crate::FeedbackAdjuster).
#[derive(Clone, Debug)]
pub struct Job {
    path: PathBuf,
    arrival: Arrival,
    est_cost: CostBucket,
    pub remaining: i64,
    pub queue_level: QueueLevel,
    pub state: JobState,
}

impl Job {
    pub fn new(
        path: impl Into<PathBuf>,
        arrival: Arrival,
        est_cost: CostBucket,
    ) -> Self {
        Self {
            path: path.into(),
            arrival,
            est_cost,
            remaining: est_cost.units(),
            queue_level: QueueLevel::default(),
            state: JobState::Queued,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn arrival(&self) -> Arrival {
        self.arrival
    }

    pub fn est_cost(&self) -> CostBucket {
        self.est_cost
    }

    /// Consume `quantum` work units and report whether the job still has work.
    pub fn consume(&mut self, quantum: u32) -> bool {
        self.remaining -= i64::from(quantum);
        self.remaining > 0
    }

    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }
}
