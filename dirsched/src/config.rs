use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::BackendKind;
use crate::error::ConfigError;
use crate::feedback::LARGE_FILE_BYTES;
use crate::scan::HashAlgorithm;
use crate::scheduler::{SchedulingPolicy, DEFAULT_QUANTUM};
use crate::workload::WorkloadBuilder;

/// Bound of the channel records travel through from workers to the sink.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// How many times a simulation replays the file list.
pub const DEFAULT_REPEAT: usize = 10;

/// How many simulation runs `simulate` performs.
pub const DEFAULT_RUNS: u32 = 3;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Configuration for a backend worker pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker tasks or processes.
    pub workers: usize,
    /// Capacity of the record channel between workers and the sink.
    pub channel_capacity: usize,
    /// Program spawned for isolated workers. `None` re-executes this binary.
    pub worker_program: Option<PathBuf>,
}

impl PoolConfig {
    /// Create a pool configuration with the given worker count.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the record channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the program isolated workers are spawned from.
    pub fn with_worker_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(program.into());
        self
    }

    /// Reject settings no pool can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            worker_program: None,
        }
    }
}

/// Parameters of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Dispatch policy driving the run.
    pub policy: SchedulingPolicy,
    /// Run number stamped into every record.
    pub run_id: u32,
    /// How many times the file list is replayed as jobs.
    pub repeat: usize,
    /// Work units consumed per RR/MLFQ dispatch.
    pub quantum: u32,
    /// Digest used for each scanned file.
    pub algorithm: HashAlgorithm,
    /// Size above which a scanned file demotes its job.
    pub large_file_bytes: u64,
}

impl SimulationConfig {
    /// Create a simulation configuration for the given policy.
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Set the run number.
    pub fn with_run_id(mut self, run_id: u32) -> Self {
        self.run_id = run_id;
        self
    }

    /// Set the repeat count.
    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set the dispatch quantum.
    pub fn with_quantum(mut self, quantum: u32) -> Self {
        self.quantum = quantum;
        self
    }

    /// Set the hash algorithm.
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the large-file demotion threshold.
    pub fn with_large_file_bytes(mut self, bytes: u64) -> Self {
        self.large_file_bytes = bytes;
        self
    }

    /// Reject settings no run can start with, before any file is touched.
    ///
    /// `repeat` is checked as if the tree held a single file; the exact job
    /// count is checked again once the files are known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.dispatcher(self.quantum)?;
        self.workload().job_count(1)?;
        Ok(())
    }

    pub fn workload(&self) -> WorkloadBuilder {
        WorkloadBuilder::new().with_repeat(self.repeat)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::default(),
            run_id: 1,
            repeat: DEFAULT_REPEAT,
            quantum: DEFAULT_QUANTUM,
            algorithm: HashAlgorithm::default(),
            large_file_bytes: LARGE_FILE_BYTES,
        }
    }
}

/// Defaults for the `index` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: BackendKind,
    pub algorithm: HashAlgorithm,
    pub output: PathBuf,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::SharedPool,
            algorithm: HashAlgorithm::default(),
            output: PathBuf::from("index.jsonl"),
        }
    }
}

/// Defaults for the `simulate` command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulateSettings {
    pub runs: u32,
    pub output_dir: PathBuf,
    #[serde(flatten)]
    pub run: SimulationConfig,
}

impl Default for SimulateSettings {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            output_dir: PathBuf::from("."),
            run: SimulationConfig::default(),
        }
    }
}

/// File-level defaults, loaded from TOML.
///
/// Every section and field is optional; command-line flags override
/// whatever is loaded here.
///
/// ```toml
/// [pool]
/// workers = 4
///
/// [index]
/// backend = "isolated_pool"
/// algorithm = "blake3"
///
/// [simulate]
/// policy = "mlfq"
/// runs = 5
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pool: PoolConfig,
    pub index: IndexSettings,
    pub simulate: SimulateSettings,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            ConfigError::Unreadable {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        Self::from_toml(&text).map_err(|err| match err {
            ConfigError::Invalid { message, .. } => ConfigError::Invalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(text).map_err(|err| ConfigError::Invalid {
                path: PathBuf::new(),
                message: err.to_string(),
            })?;
        settings.pool.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_builders() {
        let config = PoolConfig::new(3)
            .with_channel_capacity(8)
            .with_worker_program("/bin/worker");
        assert_eq!(config.workers, 3);
        assert_eq!(config.channel_capacity, 8);
        assert_eq!(config.worker_program, Some(PathBuf::from("/bin/worker")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert_eq!(
            PoolConfig::new(0).validate(),
            Err(ConfigError::ZeroWorkers)
        );
    }

    #[test]
    fn test_simulation_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.policy, SchedulingPolicy::Fcfs);
        assert_eq!(config.repeat, DEFAULT_REPEAT);
        assert_eq!(config.quantum, 1);
        assert_eq!(config.large_file_bytes, 10_000_000);
    }

    #[test]
    fn test_simulation_validate() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert_eq!(
            SimulationConfig::new(SchedulingPolicy::Mlfq)
                .with_quantum(0)
                .validate(),
            Err(ConfigError::ZeroQuantum)
        );
        assert!(matches!(
            SimulationConfig::default().with_repeat(usize::MAX).validate(),
            Err(ConfigError::WorkloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_settings_from_partial_toml() {
        let settings = Settings::from_toml(
            r#"
            [pool]
            workers = 2

            [index]
            backend = "isolated_pool"
            algorithm = "blake3"

            [simulate]
            policy = "rr"
            runs = 5
            repeat = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.pool.workers, 2);
        assert_eq!(settings.pool.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(settings.index.backend, BackendKind::IsolatedPool);
        assert_eq!(settings.index.algorithm, HashAlgorithm::Blake3);
        assert_eq!(settings.index.output, PathBuf::from("index.jsonl"));
        assert_eq!(settings.simulate.runs, 5);
        assert_eq!(settings.simulate.run.policy, SchedulingPolicy::RoundRobin);
        assert_eq!(settings.simulate.run.repeat, 2);
    }

    #[test]
    fn test_settings_accept_command_line_names() {
        let settings = Settings::from_toml(
            r#"
            [index]
            backend = "shared"
            algorithm = "SHA-512"

            [simulate]
            policy = "RR"
            "#,
        )
        .unwrap();
        assert_eq!(settings.index.backend, BackendKind::SharedPool);
        assert_eq!(settings.index.algorithm, HashAlgorithm::Sha512);
        assert_eq!(settings.simulate.run.policy, SchedulingPolicy::RoundRobin);

        let settings = Settings::from_toml("[index]\nbackend = \"isolated\"").unwrap();
        assert_eq!(settings.index.backend, BackendKind::IsolatedPool);
        assert!(matches!(
            Settings::from_toml("[index]\nbackend = \"gpu\""),
            Err(ConfigError::Invalid { message, .. }) if message.contains("gpu")
        ));
    }

    #[test]
    fn test_settings_reject_bad_values() {
        assert!(matches!(
            Settings::from_toml("[index]\nalgorithm = \"md5\""),
            Err(ConfigError::Invalid { .. })
        ));
        assert_eq!(
            Settings::from_toml("[pool]\nworkers = 0"),
            Err(ConfigError::ZeroWorkers)
        );
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Settings::load(&missing),
            Err(ConfigError::Unreadable { path, .. }) if path == missing
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "pool = 3").unwrap();
        assert!(matches!(
            Settings::load(&bad),
            Err(ConfigError::Invalid { path, .. }) if path == bad
        ));
    }
}
