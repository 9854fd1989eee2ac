//! End-to-end tests for the quick-start runner
//!
//! A throwaway repository root is populated with placeholder artifacts and a
//! shell script standing in for `src/sample_motion.py`, so the real child
//! process path is exercised without the motion model.

#![cfg(unix)]

use light_t2m_runner::assets::fetch::{ArchiveFetcher, FetchError};
use light_t2m_runner::config::{Config, CONFIG_FILE_NAME};
use light_t2m_runner::device::DeviceProbe;
use light_t2m_runner::inference::{CommandRunner, InferenceCommand, InferenceError, ProcessRunner};
use light_t2m_runner::{run, RunError};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

/// Fetcher that records calls and never succeeds
#[derive(Default)]
struct RecordingFetcher {
    calls: Cell<usize>,
}

impl ArchiveFetcher for RecordingFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        self.calls.set(self.calls.get() + 1);
        Err(FetchError::Io {
            path: dest.to_path_buf(),
            source: std::io::Error::other(format!("network disabled in tests: {url}")),
        })
    }
}

struct FixedProbe(bool);

impl DeviceProbe for FixedProbe {
    fn accelerator_available(&self) -> bool {
        self.0
    }
}

/// Real process runner that remembers what it launched
#[derive(Default)]
struct RecordingRunner {
    launched: RefCell<Vec<InferenceCommand>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &InferenceCommand) -> std::io::Result<Option<i32>> {
        self.launched.borrow_mut().push(command.clone());
        ProcessRunner.run(command)
    }
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"placeholder").unwrap();
}

/// Repository root with every artifact present and a stub inference script
fn prepared_repo(script_body: &str) -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("deps/glove")).unwrap();
    fs::create_dir_all(root.join("deps/t2m_guo")).unwrap();
    touch(&root.join("checkpoints/hml3d.ckpt"));
    touch(&root.join("data/HumanML3D/Mean.npy"));
    touch(&root.join("data/HumanML3D/Std.npy"));

    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/sample_motion.py"), script_body).unwrap();
    fs::write(
        root.join(CONFIG_FILE_NAME),
        "[inference]\ninterpreter = \"sh\"\n",
    )
    .unwrap();

    let config = Config::load(root).unwrap();
    (dir, config)
}

#[test]
fn test_all_present_runs_once_without_downloads() {
    let (dir, config) = prepared_repo("printf '%s\\n' \"$@\" > args.txt\n");
    let fetcher = RecordingFetcher::default();
    let runner = RecordingRunner::default();

    run(&config, &fetcher, &FixedProbe(false), &runner).unwrap();

    assert_eq!(fetcher.calls.get(), 0);
    assert_eq!(runner.launched.borrow().len(), 1);
    assert!(!dir.path().join("downloads").exists());

    // Child ran in the repository root and saw the fixed argument list
    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    let ckpt = format!("ckpt_path={}", dir.path().join("checkpoints/hml3d.ckpt").display());
    let data = format!("data_dir={}", dir.path().join("data/HumanML3D").display());
    assert_eq!(
        args,
        vec![
            ckpt.as_str(),
            data.as_str(),
            "save_path=./visual_datas",
            "sample_name=quick_start",
            "text=A person walks forward and waves their right hand.",
            "length=60",
            "repeats=1",
            "device=cpu",
            "model.guidance_scale=4",
            "model.noise_scheduler.prediction_type=sample",
        ]
    );
}

#[test]
fn test_accelerator_selects_device_zero() {
    let (dir, config) = prepared_repo("printf '%s\\n' \"$@\" > args.txt\n");
    let runner = RecordingRunner::default();

    run(&config, &RecordingFetcher::default(), &FixedProbe(true), &runner).unwrap();

    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert!(args.lines().any(|line| line == "device=0"));
}

#[test]
fn test_child_failure_is_propagated() {
    let (_dir, config) = prepared_repo("exit 3\n");
    let runner = RecordingRunner::default();

    let err = run(&config, &RecordingFetcher::default(), &FixedProbe(false), &runner).unwrap_err();

    assert!(matches!(
        err,
        RunError::Inference(InferenceError::Failed { code: Some(3) })
    ));
    assert_eq!(runner.launched.borrow().len(), 1);
}

#[test]
fn test_missing_stats_stops_before_inference() {
    let (dir, config) = prepared_repo("exit 0\n");
    fs::remove_file(dir.path().join("data/HumanML3D/Mean.npy")).unwrap();
    let fetcher = RecordingFetcher::default();
    let runner = RecordingRunner::default();

    let err = run(&config, &fetcher, &FixedProbe(false), &runner).unwrap_err();

    assert!(matches!(err, RunError::Provision(_)));
    let message = err.to_string();
    assert!(message.contains("Mean.npy"));
    assert!(message.contains("Std.npy"));
    assert_eq!(fetcher.calls.get(), 0);
    assert!(runner.launched.borrow().is_empty());
}

#[test]
fn test_fetch_failure_is_fatal_and_attempted_once() {
    let (dir, config) = prepared_repo("exit 0\n");
    fs::remove_file(dir.path().join("checkpoints/hml3d.ckpt")).unwrap();
    let fetcher = RecordingFetcher::default();
    let runner = RecordingRunner::default();

    let err = run(&config, &fetcher, &FixedProbe(false), &runner).unwrap_err();

    assert!(err.to_string().contains("network disabled in tests"));
    assert_eq!(fetcher.calls.get(), 1);
    assert!(runner.launched.borrow().is_empty());
}
