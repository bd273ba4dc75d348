//! The single-threaded tick loop that compares dispatch policies.
//!
//! Each tick the configured policy picks one job, the job's file is
//! scanned synchronously, and the record is annotated with the job's
//! scheduling state, fed back into its priority, and written to the sink.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::feedback::FeedbackAdjuster;
use crate::job::Tick;
use crate::record::ScheduleMeta;
use crate::scan::scan_path;
use crate::scheduler::{RunQueue, SchedulingPolicy};
use crate::sink::JsonlSink;
use crate::telemetry;

/// Source label for records produced by the tick loop.
pub const SIMULATION_SOURCE: &str = "simulation";

/// Totals for one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scheduler: String,
    pub run_id: u32,
    pub started_at: DateTime<Utc>,
    /// Jobs that reached completion.
    pub jobs: usize,
    /// Dispatches made, including partial RR/MLFQ slices.
    pub dispatches: usize,
    pub ticks: Tick,
    pub wall_time_sec: f64,
    /// Mean of `tick - arrival` over completing dispatches.
    pub avg_latency_ticks: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run {}: jobs={} dispatches={} ticks={} wall_time_sec={:.3} avg_latency_ticks={:.2}",
            self.scheduler,
            self.run_id,
            self.jobs,
            self.dispatches,
            self.ticks,
            self.wall_time_sec,
            self.avg_latency_ticks,
        )
    }
}

/// Run one simulation over `paths`, writing one record per dispatch.
pub fn run_simulation<W: Write>(
    config: &SimulationConfig,
    paths: &[PathBuf],
    sink: &mut JsonlSink<W>,
) -> anyhow::Result<RunSummary> {
    let mut policy = config.policy.dispatcher(config.quantum)?;
    let label = config.policy.label();
    let feedback = FeedbackAdjuster::new(config.large_file_bytes);
    let jobs = config.workload().build(paths)?;
    let mut queue = RunQueue::new(jobs);

    tracing::info!(
        scheduler = label,
        run_id = config.run_id,
        jobs = queue.jobs().len(),
        algorithm = %config.algorithm,
        "simulation started"
    );

    let started_at = Utc::now();
    let started = Instant::now();
    let mut tick: Tick = 0;
    let mut dispatches = 0usize;
    let mut completed = 0usize;
    let mut latency_total: u64 = 0;

    while !queue.is_empty() {
        tick += 1;
        let Some(dispatch) = policy.choose_next(&mut queue, tick) else {
            break;
        };
        dispatches += 1;

        let span = telemetry::dispatch_span(label, dispatch.job, tick);
        let _enter = span.enter();

        let job = queue.job(dispatch.job);
        let arrival = job.arrival();
        let timer = telemetry::start_scan(job.path());
        let record = scan_path(job.path(), config.algorithm);
        telemetry::finish_scan(timer, SIMULATION_SOURCE);
        let record = record.with_schedule(ScheduleMeta::capture(
            job,
            label,
            config.run_id,
            tick,
        ));

        let adjustment = feedback.apply(queue.job_mut(dispatch.job), &record);
        telemetry::record_dispatch(label, dispatch.job, tick, dispatch.completed);
        telemetry::record_feedback(label, dispatch.job, adjustment);
        telemetry::set_ready_queue_depth(label, queue.ready_len());

        sink.write_record(&record)?;
        telemetry::record_indexed(SIMULATION_SOURCE, &record);

        if dispatch.completed {
            completed += 1;
            latency_total += tick.saturating_sub(arrival);
        }
    }

    let summary = RunSummary {
        scheduler: label.to_string(),
        run_id: config.run_id,
        started_at,
        jobs: completed,
        dispatches,
        ticks: tick,
        wall_time_sec: started.elapsed().as_secs_f64(),
        avg_latency_ticks: if completed == 0 {
            0.0
        } else {
            latency_total as f64 / completed as f64
        },
    };
    tracing::info!(
        scheduler = label,
        run_id = summary.run_id,
        jobs = summary.jobs,
        ticks = summary.ticks,
        wall_time_sec = summary.wall_time_sec,
        avg_latency_ticks = summary.avg_latency_ticks,
        "simulation finished"
    );
    Ok(summary)
}

/// File a run's records are written to: `index_results_<SCHED>_run<N>.jsonl`.
pub fn run_file_name(scheduler: &str, run_id: u32) -> String {
    format!("index_results_{scheduler}_run{run_id}.jsonl")
}

/// Run `runs` simulations numbered from 1, each into its own file under
/// `output_dir`.
pub fn run_series(
    config: &SimulationConfig,
    paths: &[PathBuf],
    runs: u32,
    output_dir: &Path,
) -> anyhow::Result<Vec<RunSummary>> {
    config.validate()?;
    config.workload().job_count(paths.len())?;

    let mut summaries = Vec::with_capacity(runs as usize);
    for run_id in 1..=runs {
        let run = config.clone().with_run_id(run_id);
        let path = output_dir.join(run_file_name(run.policy.label(), run_id));
        let mut sink = JsonlSink::create(&path)?;
        summaries.push(run_simulation(&run, paths, &mut sink)?);
    }
    Ok(summaries)
}

/// Run a series under each policy in turn, every other setting shared, and
/// return all summaries in policy order.
///
/// Every policy is validated before the first run starts. Repeated policies
/// run once.
pub fn run_comparison(
    config: &SimulationConfig,
    policies: &[SchedulingPolicy],
    paths: &[PathBuf],
    runs: u32,
    output_dir: &Path,
) -> anyhow::Result<Vec<RunSummary>> {
    let mut configs: Vec<SimulationConfig> = Vec::with_capacity(policies.len());
    for &policy in policies {
        if configs.iter().any(|c| c.policy == policy) {
            continue;
        }
        let run = SimulationConfig {
            policy,
            ..config.clone()
        };
        run.validate()?;
        run.workload().job_count(paths.len())?;
        configs.push(run);
    }

    let mut summaries = Vec::with_capacity(configs.len() * runs as usize);
    for run in &configs {
        summaries.extend(run_series(run, paths, runs, output_dir)?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::IndexRecord;
    use std::collections::HashMap;

    fn fixture() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.txt");
        std::fs::write(&small, vec![b'a'; 1_024]).unwrap();
        let medium = dir.path().join("medium.bin");
        std::fs::write(&medium, vec![b'b'; 200_000]).unwrap();
        (dir, vec![small, medium])
    }

    fn records(sink: JsonlSink<Vec<u8>>) -> Vec<IndexRecord> {
        String::from_utf8(sink.into_inner())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_fcfs_logs_each_job_once_in_arrival_order() {
        let (_dir, paths) = fixture();
        let config = SimulationConfig::new(SchedulingPolicy::Fcfs).with_repeat(2);
        let mut sink = JsonlSink::new(Vec::new());

        let summary = run_simulation(&config, &paths, &mut sink).unwrap();
        assert_eq!(summary.jobs, 4);
        assert_eq!(summary.dispatches, 4);
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.avg_latency_ticks, 0.0);

        let arrivals: Vec<_> = records(sink)
            .iter()
            .map(|r| r.schedule.as_ref().unwrap().arrival)
            .collect();
        assert_eq!(arrivals, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rr_logs_each_slice() {
        let (_dir, paths) = fixture();
        let config = SimulationConfig::new(SchedulingPolicy::RoundRobin).with_repeat(1);
        let mut sink = JsonlSink::new(Vec::new());

        let summary = run_simulation(&config, &paths, &mut sink).unwrap();
        // small costs 1, medium costs 2.
        assert_eq!(summary.jobs, 2);
        assert_eq!(summary.dispatches, 3);

        let mut per_path: HashMap<String, Vec<i64>> = HashMap::new();
        for record in records(sink) {
            let meta = record.schedule.unwrap();
            assert_eq!(meta.scheduler, "RR");
            per_path.entry(record.path).or_default().push(meta.remaining);
        }
        assert_eq!(per_path[&paths[0].display().to_string()], vec![0]);
        assert_eq!(per_path[&paths[1].display().to_string()], vec![1, 0]);
    }

    #[test]
    fn test_queue_level_is_recorded_before_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.txt");
        let config = SimulationConfig::new(SchedulingPolicy::Fcfs).with_repeat(1);
        let mut sink = JsonlSink::new(Vec::new());

        run_simulation(&config, &[missing], &mut sink).unwrap();
        let records = records(sink);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());
        assert_eq!(records[0].schedule.as_ref().unwrap().queue_level.as_u8(), 0);
    }

    #[test]
    fn test_zero_quantum_fails_before_any_work() {
        let (_dir, paths) = fixture();
        let config = SimulationConfig::new(SchedulingPolicy::RoundRobin).with_quantum(0);
        let mut sink = JsonlSink::new(Vec::new());
        assert!(run_simulation(&config, &paths, &mut sink).is_err());
        assert_eq!(sink.written(), 0);
    }

    #[test]
    fn test_oversized_series_writes_nothing() {
        let (dir, paths) = fixture();
        let out = dir.path().join("out");
        let config = SimulationConfig::new(SchedulingPolicy::Fcfs)
            .with_repeat(crate::workload::MAX_WORKLOAD_JOBS);

        let err = run_series(&config, &paths, 1, &out).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"), "{err}");
        assert!(!out.exists());
    }

    #[test]
    fn test_series_writes_one_file_per_run() {
        let (dir, paths) = fixture();
        let out = dir.path().join("out");
        let config = SimulationConfig::new(SchedulingPolicy::Mlfq).with_repeat(1);

        let summaries = run_series(&config, &paths, 3, &out).unwrap();
        assert_eq!(summaries.len(), 3);
        for (i, summary) in summaries.iter().enumerate() {
            let run_id = i as u32 + 1;
            assert_eq!(summary.run_id, run_id);
            let file = out.join(format!("index_results_MLFQ_run{run_id}.jsonl"));
            let text = std::fs::read_to_string(file).unwrap();
            assert_eq!(text.lines().count(), summary.dispatches);
        }
    }

    #[test]
    fn test_comparison_runs_each_policy_once() {
        let (dir, paths) = fixture();
        let out = dir.path().join("out");
        let config = SimulationConfig::default().with_repeat(1);
        let policies = [
            SchedulingPolicy::Fcfs,
            SchedulingPolicy::RoundRobin,
            SchedulingPolicy::Fcfs,
        ];

        let summaries = run_comparison(&config, &policies, &paths, 3, &out).unwrap();
        let labels: Vec<(&str, u32)> = summaries
            .iter()
            .map(|s| (s.scheduler.as_str(), s.run_id))
            .collect();
        assert_eq!(
            labels,
            vec![("FCFS", 1), ("FCFS", 2), ("FCFS", 3), ("RR", 1), ("RR", 2), ("RR", 3)]
        );
        assert!(out.join("index_results_FCFS_run3.jsonl").exists());
        assert!(out.join("index_results_RR_run3.jsonl").exists());
    }
}
