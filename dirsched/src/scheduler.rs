use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::job::{Job, JobId, JobState, Tick};

/// Work units a preemptive dispatch consumes.
pub const DEFAULT_QUANTUM: u32 = 1;

/// The dispatch disciplines a run can be configured with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SchedulingPolicy {
    /// First-come-first-served; every dispatch runs the job to completion.
    #[default]
    Fcfs,
    /// Round robin with a fixed quantum; unfinished jobs go to the tail.
    #[serde(rename = "rr")]
    RoundRobin,
    /// Round robin ordered by feedback level, then arrival.
    Mlfq,
}

impl SchedulingPolicy {
    /// Label written to the `scheduler` field of every record.
    pub fn label(&self) -> &'static str {
        match self {
            SchedulingPolicy::Fcfs => "FCFS",
            SchedulingPolicy::RoundRobin => "RR",
            SchedulingPolicy::Mlfq => "MLFQ",
        }
    }

    /// Resolve the policy into the strategy the tick loop calls.
    pub fn dispatcher(
        &self,
        quantum: u32,
    ) -> Result<Box<dyn DispatchPolicy>, ConfigError> {
        if quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        Ok(match self {
            SchedulingPolicy::Fcfs => Box::new(FcfsPolicy),
            SchedulingPolicy::RoundRobin => Box::new(RoundRobinPolicy::new(quantum)),
            SchedulingPolicy::Mlfq => Box::new(MlfqPolicy::new(quantum)),
        })
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fcfs" | "fifo" => Ok(SchedulingPolicy::Fcfs),
            "rr" | "round-robin" | "roundrobin" => Ok(SchedulingPolicy::RoundRobin),
            "mlfq" => Ok(SchedulingPolicy::Mlfq),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for SchedulingPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Job table plus the ready queue of ids that index into it.
///
/// The simulation loop owns this exclusively; policies borrow it mutably for
/// the duration of one `choose_next` call.
pub struct RunQueue {
    jobs: Vec<Job>,
    ready: VecDeque<JobId>,
}

impl RunQueue {
    /// Load every job as ready, in ascending arrival order.
    pub fn new(jobs: Vec<Job>) -> Self {
        let mut ready: Vec<JobId> = (0..jobs.len()).map(JobId).collect();
        ready.sort_by_key(|id| jobs[id.0].arrival());
        Self {
            jobs,
            ready: ready.into(),
        }
    }

    pub fn job(&self, id: JobId) -> &Job {
        &self.jobs[id.0]
    }

    pub fn job_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id.0]
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn ready(&self) -> impl Iterator<Item = JobId> + '_ {
        self.ready.iter().copied()
    }

    pub fn pop_front(&mut self) -> Option<JobId> {
        self.ready.pop_front()
    }

    pub fn push_back(&mut self, id: JobId) {
        self.jobs[id.0].state = JobState::Queued;
        self.ready.push_back(id);
    }

    /// Remove and return the ready job minimising `key`; ties keep queue order.
    pub fn take_min_by_key<K, F>(&mut self, mut key: F) -> Option<JobId>
    where
        K: Ord,
        F: FnMut(&Job) -> K,
    {
        let position = self
            .ready
            .iter()
            .enumerate()
            .min_by_key(|(pos, id)| (key(&self.jobs[id.0]), *pos))
            .map(|(pos, _)| pos)?;
        self.ready.remove(position)
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }
}

impl fmt::Debug for RunQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunQueue")
            .field("jobs", &self.jobs.len())
            .field("ready", &self.ready.len())
            .finish()
    }
}

/// Outcome of one dispatch decision.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Dispatch {
    pub job: JobId,
    /// The job will not be dispatched again.
    pub completed: bool,
}

/// A dispatch discipline: picks the job that runs during one tick.
pub trait DispatchPolicy: Send {
    /// Label written to the `scheduler` field.
    fn name(&self) -> &'static str;

    /// Choose the job to run at `tick`, or `None` when nothing is ready.
    fn choose_next(&mut self, queue: &mut RunQueue, tick: Tick) -> Option<Dispatch>;
}

/// Head of the queue, run to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct FcfsPolicy;

impl DispatchPolicy for FcfsPolicy {
    fn name(&self) -> &'static str {
        SchedulingPolicy::Fcfs.label()
    }

    fn choose_next(&mut self, queue: &mut RunQueue, _tick: Tick) -> Option<Dispatch> {
        let id = queue.pop_front()?;
        queue.job_mut(id).state = JobState::Complete;
        Some(Dispatch {
            job: id,
            completed: true,
        })
    }
}

/// Head of the queue for one quantum; unfinished jobs re-enter at the tail.
///
/// The job is returned whether or not it finished, so the loop logs a record
/// on every tick a job is scheduled.
#[derive(Clone, Copy, Debug)]
pub struct RoundRobinPolicy {
    quantum: u32,
}

impl RoundRobinPolicy {
    pub fn new(quantum: u32) -> Self {
        Self {
            quantum: quantum.max(1),
        }
    }

    pub fn quantum(&self) -> u32 {
        self.quantum
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM)
    }
}

impl DispatchPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        SchedulingPolicy::RoundRobin.label()
    }

    fn choose_next(&mut self, queue: &mut RunQueue, _tick: Tick) -> Option<Dispatch> {
        let id = queue.pop_front()?;
        Some(run_quantum(queue, id, self.quantum))
    }
}

/// Lowest `queue_level` first, earliest arrival breaking ties, one quantum
/// per dispatch.
#[derive(Clone, Copy, Debug)]
pub struct MlfqPolicy {
    quantum: u32,
}

impl MlfqPolicy {
    pub fn new(quantum: u32) -> Self {
        Self {
            quantum: quantum.max(1),
        }
    }
}

impl Default for MlfqPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM)
    }
}

impl DispatchPolicy for MlfqPolicy {
    fn name(&self) -> &'static str {
        SchedulingPolicy::Mlfq.label()
    }

    fn choose_next(&mut self, queue: &mut RunQueue, _tick: Tick) -> Option<Dispatch> {
        let id = queue.take_min_by_key(|job| (job.queue_level, job.arrival()))?;
        Some(run_quantum(queue, id, self.quantum))
    }
}

fn run_quantum(queue: &mut RunQueue, id: JobId, quantum: u32) -> Dispatch {
    let job = queue.job_mut(id);
    job.state = JobState::Running;
    if job.consume(quantum) {
        queue.push_back(id);
        Dispatch {
            job: id,
            completed: false,
        }
    } else {
        job.state = JobState::Complete;
        Dispatch {
            job: id,
            completed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CostBucket, QueueLevel};

    fn queue_with_costs(costs: &[CostBucket]) -> RunQueue {
        let jobs = costs
            .iter()
            .enumerate()
            .map(|(i, cost)| Job::new(format!("/f{i}"), i as u64 + 1, *cost))
            .collect();
        RunQueue::new(jobs)
    }

    fn drain(
        policy: &mut dyn DispatchPolicy,
        queue: &mut RunQueue,
    ) -> Vec<Dispatch> {
        let mut tick = 0;
        let mut out = Vec::new();
        while !queue.is_empty() {
            tick += 1;
            if let Some(dispatch) = policy.choose_next(queue, tick) {
                out.push(dispatch);
            }
        }
        out
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("FCFS".parse::<SchedulingPolicy>(), Ok(SchedulingPolicy::Fcfs));
        assert_eq!("rr".parse::<SchedulingPolicy>(), Ok(SchedulingPolicy::RoundRobin));
        assert_eq!("mlfq".parse::<SchedulingPolicy>(), Ok(SchedulingPolicy::Mlfq));
        assert_eq!(
            "sjf".parse::<SchedulingPolicy>(),
            Err(ConfigError::UnknownPolicy("sjf".into()))
        );
    }

    #[test]
    fn test_zero_quantum_is_rejected() {
        assert_eq!(
            SchedulingPolicy::RoundRobin.dispatcher(0).err(),
            Some(ConfigError::ZeroQuantum)
        );
    }

    #[test]
    fn test_empty_queue_yields_no_job() {
        let mut queue = RunQueue::new(Vec::new());
        for policy in [
            SchedulingPolicy::Fcfs,
            SchedulingPolicy::RoundRobin,
            SchedulingPolicy::Mlfq,
        ] {
            let mut dispatcher = policy.dispatcher(DEFAULT_QUANTUM).unwrap();
            assert_eq!(dispatcher.choose_next(&mut queue, 1), None);
        }
    }

    #[test]
    fn test_run_queue_loads_in_arrival_order() {
        let jobs = vec![
            Job::new("/late", 3, CostBucket::Small),
            Job::new("/early", 1, CostBucket::Small),
            Job::new("/middle", 2, CostBucket::Small),
        ];
        let queue = RunQueue::new(jobs);
        let order: Vec<_> = queue.ready().map(|id| queue.job(id).arrival()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_fcfs_dispatches_in_arrival_order() {
        let mut queue = queue_with_costs(&[
            CostBucket::Large,
            CostBucket::Small,
            CostBucket::Medium,
            CostBucket::Small,
        ]);
        let dispatches = drain(&mut FcfsPolicy, &mut queue);

        let arrivals: Vec<_> = dispatches
            .iter()
            .map(|d| queue.job(d.job).arrival())
            .collect();
        assert_eq!(arrivals, vec![1, 2, 3, 4]);
        assert!(dispatches.iter().all(|d| d.completed));
        // FCFS never consumes the work budget.
        assert!(queue.jobs().iter().all(|j| j.remaining == j.est_cost().units()));
    }

    #[test]
    fn test_round_robin_dispatches_cost_times() {
        let mut queue = queue_with_costs(&[
            CostBucket::Large,
            CostBucket::Small,
            CostBucket::Medium,
        ]);
        let dispatches = drain(&mut RoundRobinPolicy::default(), &mut queue);

        let order: Vec<_> = dispatches.iter().map(|d| d.job.0).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 2, 0]);

        for (index, job) in queue.jobs().iter().enumerate() {
            let count = dispatches.iter().filter(|d| d.job.0 == index).count();
            assert_eq!(count as i64, job.est_cost().units());
            assert_eq!(job.remaining, 0);
            assert!(job.is_complete());
        }

        let completed: Vec<_> = dispatches.iter().filter(|d| d.completed).map(|d| d.job.0).collect();
        assert_eq!(completed, vec![1, 2, 0]);
    }

    #[test]
    fn test_round_robin_requeues_unfinished_job_at_tail() {
        let mut queue = queue_with_costs(&[CostBucket::Medium, CostBucket::Small]);
        let mut policy = RoundRobinPolicy::default();

        let first = policy.choose_next(&mut queue, 1).unwrap();
        assert_eq!(first, Dispatch { job: JobId(0), completed: false });
        assert_eq!(queue.job(JobId(0)).remaining, 1);
        assert_eq!(queue.job(JobId(0)).state, JobState::Queued);

        let tail: Vec<_> = queue.ready().collect();
        assert_eq!(tail, vec![JobId(1), JobId(0)]);
    }

    #[test]
    fn test_mlfq_prefers_lower_level_then_arrival() {
        let mut queue = queue_with_costs(&[
            CostBucket::Small,
            CostBucket::Small,
            CostBucket::Small,
        ]);
        queue.job_mut(JobId(0)).queue_level = QueueLevel::Q2;
        queue.job_mut(JobId(1)).queue_level = QueueLevel::Q1;
        queue.job_mut(JobId(2)).queue_level = QueueLevel::Q1;

        let dispatches = drain(&mut MlfqPolicy::default(), &mut queue);
        let order: Vec<_> = dispatches.iter().map(|d| d.job.0).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_mlfq_sees_level_changes_of_queued_jobs() {
        let mut queue = queue_with_costs(&[CostBucket::Medium, CostBucket::Small]);
        let mut policy = MlfqPolicy::default();

        let first = policy.choose_next(&mut queue, 1).unwrap();
        assert_eq!(first.job, JobId(0));
        // Demote the requeued job the way feedback would.
        queue.job_mut(JobId(0)).queue_level = QueueLevel::Q1;

        let second = policy.choose_next(&mut queue, 2).unwrap();
        assert_eq!(second.job, JobId(1));
    }
}
