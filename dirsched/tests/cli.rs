//! End-to-end tests driving the `dirsched` binary.

use std::path::Path;
use std::process::{Command, Output};

use dirsched_testkit::TreeFixture;

fn dirsched(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dirsched"))
        .args(args)
        .env("LOG_LEVEL", "warn")
        .output()
        .expect("binary runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_index_then_query() {
    let mut tree = TreeFixture::new().unwrap();
    tree.file("docs/readme.md", 512).unwrap();
    tree.file("media/clip.bin", 2 * 1024 * 1024 + 10).unwrap();
    let out = tempfile::tempdir().unwrap();
    let index = out.path().join("index.jsonl");

    for backend in ["shared", "isolated"] {
        let output = dirsched(&[
            "index",
            arg(tree.root()),
            "--backend",
            backend,
            "--workers",
            "2",
            "--output",
            arg(&index),
        ]);
        assert!(output.status.success(), "{backend}: {output:?}");
        assert_eq!(std::fs::read_to_string(&index).unwrap().lines().count(), 2);
    }

    let output = dirsched(&["find", arg(&index), "1"]);
    assert!(output.status.success());
    let found = stdout(&output);
    assert_eq!(found.lines().count(), 1);
    assert!(found.trim_end().ends_with(&format!("clip.bin {}", 2 * 1024 * 1024 + 10)));

    let output = dirsched(&["checksum", arg(&index), "readme.md"]);
    assert!(output.status.success());
    let expected = dirsched::HashAlgorithm::Sha256
        .hash_file(&tree.path("docs/readme.md"))
        .unwrap();
    assert_eq!(stdout(&output).trim(), expected);

    let output = dirsched(&["checksum", arg(&index), "missing.md"]);
    assert_eq!(stdout(&output).trim(), "File not found");
}

#[test]
fn test_simulate_writes_run_files() {
    let mut tree = TreeFixture::new().unwrap();
    tree.many(3).unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = dirsched(&[
        "simulate",
        arg(tree.root()),
        "--scheduler",
        "rr",
        "--runs",
        "2",
        "--repeat",
        "2",
        "--output-dir",
        arg(out.path()),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout(&output).lines().count(), 2);
    for run in 1..=2 {
        let file = out.path().join(format!("index_results_RR_run{run}.jsonl"));
        assert_eq!(std::fs::read_to_string(file).unwrap().lines().count(), 6);
    }
}

#[test]
fn test_simulate_compares_several_schedulers() {
    let mut tree = TreeFixture::new().unwrap();
    tree.many(2).unwrap();
    let out = tempfile::tempdir().unwrap();

    let output = dirsched(&[
        "simulate",
        arg(tree.root()),
        "--scheduler",
        "fcfs,rr",
        "--runs",
        "3",
        "--repeat",
        "1",
        "--output-dir",
        arg(out.path()),
    ]);
    assert!(output.status.success(), "{output:?}");
    let summaries = stdout(&output);
    let lines: Vec<&str> = summaries.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[..3].iter().all(|line| line.starts_with("FCFS run ")));
    assert!(lines[3..].iter().all(|line| line.starts_with("RR run ")));
    for scheduler in ["FCFS", "RR"] {
        for run in 1..=3 {
            let file = out.path().join(format!("index_results_{scheduler}_run{run}.jsonl"));
            assert!(file.exists(), "{}", file.display());
        }
    }
}

#[test]
fn test_config_file_supplies_defaults() {
    let mut tree = TreeFixture::new().unwrap();
    tree.many(2).unwrap();
    let out = tempfile::tempdir().unwrap();
    let config = out.path().join("dirsched.toml");
    std::fs::write(
        &config,
        format!(
            "[simulate]\npolicy = \"mlfq\"\nruns = 1\nrepeat = 1\noutput_dir = {:?}\n",
            arg(out.path())
        ),
    )
    .unwrap();

    let output = dirsched(&["--config", arg(&config), "simulate", arg(tree.root())]);
    assert!(output.status.success(), "{output:?}");
    assert!(out.path().join("index_results_MLFQ_run1.jsonl").exists());
}

#[test]
fn test_bad_names_fail_before_work() {
    let tree = TreeFixture::new().unwrap();
    let out = tempfile::tempdir().unwrap();
    let index = out.path().join("never.jsonl");

    let output = dirsched(&[
        "index",
        arg(tree.root()),
        "--backend",
        "gpu",
        "--output",
        arg(&index),
    ]);
    assert!(!output.status.success());
    assert!(!index.exists());

    let output = dirsched(&["simulate", arg(tree.root()), "--scheduler", "sjf"]);
    assert!(!output.status.success());

    let output = dirsched(&["index", arg(tree.root()), "--algorithm", "md5"]);
    assert!(!output.status.success());

    let huge = usize::MAX.to_string();
    let output = dirsched(&[
        "simulate",
        arg(tree.root()),
        "--repeat",
        &huge,
        "--output-dir",
        arg(out.path()),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("exceeds the limit"));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);

    let output = dirsched(&[
        "index",
        arg(tree.root()),
        "--workers",
        "0",
        "--output",
        arg(&index),
    ]);
    assert!(!output.status.success());
    assert!(!index.exists());
}
