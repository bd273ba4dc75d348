use std::path::PathBuf;

use dirsched::{CostBucket, Job, RunQueue};

/// A job for a fixture path that is never touched on disk.
pub fn job_with_cost(index: usize, cost: CostBucket) -> Job {
    Job::new(
        PathBuf::from(format!("/fixture/job-{index}")),
        index as u64 + 1,
        cost,
    )
}

/// One job per cost, arriving in slice order starting at 1.
pub fn jobs_with_costs(costs: &[CostBucket]) -> Vec<Job> {
    costs
        .iter()
        .enumerate()
        .map(|(i, cost)| job_with_cost(i, *cost))
        .collect()
}

/// A ready queue holding [`jobs_with_costs`].
pub fn run_queue(costs: &[CostBucket]) -> RunQueue {
    RunQueue::new(jobs_with_costs(costs))
}
