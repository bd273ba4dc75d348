use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use dirsched::backend::worker::run_worker;
use dirsched::{
    build_scanner, checksum_of, find_larger_than, index_batch, open_index, run_comparison,
    walk, BackendKind, HashAlgorithm, JsonlSink, SchedulingPolicy, Settings,
};

#[derive(Parser, Debug)]
#[command(version, about = "Scheduling-policy simulator and parallel indexer")]
struct CliArgs {
    /// TOML file supplying defaults for every command.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every regular file under a directory with a worker pool.
    Index {
        root: PathBuf,

        /// `shared` (worker tasks) or `isolated` (worker processes).
        #[arg(long)]
        backend: Option<BackendKind>,

        #[arg(long)]
        algorithm: Option<HashAlgorithm>,

        #[arg(long)]
        workers: Option<usize>,

        /// JSON Lines file to write, truncated first.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List indexed files larger than a size in MiB.
    Find { index: PathBuf, threshold_mb: u64 },

    /// Print the stored hash of a file by name.
    Checksum { index: PathBuf, filename: String },

    /// Replay the files under a directory through a dispatch policy.
    Simulate {
        root: PathBuf,

        /// `fcfs`, `rr` or `mlfq`; several (`fcfs,rr`) run one after another.
        #[arg(long, value_delimiter = ',')]
        scheduler: Vec<SchedulingPolicy>,

        #[arg(long)]
        runs: Option<u32>,

        /// How many times the file list is replayed per run.
        #[arg(long)]
        repeat: Option<usize>,

        #[arg(long)]
        quantum: Option<u32>,

        #[arg(long)]
        algorithm: Option<HashAlgorithm>,

        /// Directory receiving `index_results_<SCHED>_run<N>.jsonl`.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Serve isolated-pool requests on stdin/stdout.
    #[command(hide = true)]
    Worker {
        #[arg(long, default_value = "sha256")]
        algorithm: HashAlgorithm,
    },
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Ok(Settings::load(path)?),
        None => Ok(Settings::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    dirsched::telemetry::init_tracing()?;

    #[cfg(feature = "metrics")]
    dirsched::metrics::init_metrics()?;

    let settings = load_settings(cli_args.config.as_deref())?;

    match cli_args.command {
        Command::Index {
            root,
            backend,
            algorithm,
            workers,
            output,
        } => {
            let backend = backend.unwrap_or(settings.index.backend);
            let algorithm = algorithm.unwrap_or(settings.index.algorithm);
            let output = output.unwrap_or(settings.index.output);
            let mut pool = settings.pool;
            if let Some(workers) = workers {
                pool = pool.with_workers(workers);
            }
            let scanner = build_scanner(backend, pool)?;

            let paths = walk::regular_files(&root)?;
            info!(
                "Indexing {} files under {:?} with {} into {:?}",
                paths.len(),
                root,
                backend,
                output
            );
            let mut sink = JsonlSink::create(&output)?;
            let report = index_batch(scanner.as_ref(), paths, algorithm, &mut sink).await?;
            println!(
                "indexed {} files ({} errors) with {} in {:.3}s -> {}",
                report.records,
                report.errors,
                report.backend,
                report.elapsed_sec,
                output.display()
            );
        }

        Command::Find {
            index,
            threshold_mb,
        } => {
            let found = find_larger_than(open_index(&index)?, threshold_mb)?;
            let mut out = BufWriter::new(io::stdout().lock());
            for entry in found {
                writeln!(out, "{} {}", entry.path, entry.size.unwrap_or_default())?;
            }
            out.flush()?;
        }

        Command::Checksum { index, filename } => {
            match checksum_of(open_index(&index)?, &filename)? {
                Some(hash) => println!("{hash}"),
                None => println!("File not found"),
            }
        }

        Command::Simulate {
            root,
            scheduler,
            runs,
            repeat,
            quantum,
            algorithm,
            output_dir,
        } => {
            let defaults = settings.simulate;
            let mut config = defaults.run;
            let policies = if scheduler.is_empty() {
                vec![config.policy]
            } else {
                scheduler
            };
            if let Some(repeat) = repeat {
                config = config.with_repeat(repeat);
            }
            if let Some(quantum) = quantum {
                config = config.with_quantum(quantum);
            }
            if let Some(algorithm) = algorithm {
                config = config.with_algorithm(algorithm);
            }
            // Fail on a bad quantum or repeat before walking the tree.
            for &policy in &policies {
                config.policy = policy;
                config.validate()?;
            }

            let runs = runs.unwrap_or(defaults.runs);
            let output_dir = output_dir.unwrap_or(defaults.output_dir);
            let paths = walk::regular_files(&root)?;
            info!(
                "Simulating {:?} over {} files, {} runs, repeat {}",
                policies,
                paths.len(),
                runs,
                config.repeat
            );

            let summaries = tokio::task::spawn_blocking(move || {
                run_comparison(&config, &policies, &paths, runs, &output_dir)
            })
            .await
            .context("simulation task panicked")??;
            for summary in summaries {
                println!("{summary}");
            }
        }

        Command::Worker { algorithm } => {
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            run_worker(algorithm, stdin, stdout)?;
        }
    }

    Ok(())
}
