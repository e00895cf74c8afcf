//! Config file loading tests

use std::fs;
use std::path::PathBuf;

use stagequeue::{Config, DoorPolicy, Stage, Strategy};
use tempfile::TempDir;

fn write(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("stagequeue.yml");
    fs::write(&path, contents).expect("Failed to write config");
    path
}

#[test]
fn test_load_token_replay_config() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write(
        &dir,
        r#"
queue:
  partition-bound: 1024
  strategy: token-replay
  schedule:
    tokens: [-1, -2, -3, 0]
    boundary: -3
    total-tensors: 6
  door:
    mode: counted
role:
  root-device: true
"#,
    );

    let config = Config::load(Some(&path)).expect("config loads");
    assert_eq!(config.queue.partition_bound, 1024);
    assert_eq!(config.queue.strategy, Strategy::TokenReplay);
    assert_eq!(config.queue.door, DoorPolicy::Counted { limit: 11 });
    let schedule = config.queue.schedule.expect("schedule present");
    assert_eq!(schedule.total_tensors, 6);
    assert!(config.role.root_device);
    assert!(Stage::Push.gates_on_table(&config.role));
}

#[test]
fn test_partial_config_keeps_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write(&dir, "queue:\n  group-size: 2\n");

    let config = Config::load_from_file(&path).expect("config loads");
    assert_eq!(config.queue.credit_multiplier(), 3);
    assert_eq!(config.queue.strategy, Strategy::Plain);
    assert!(!config.role.signal_root);
}

#[test]
fn test_invalid_schedule_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write(
        &dir,
        "queue:\n  strategy: token-replay\n  schedule:\n    tokens: [-1, -2]\n    boundary: 5\n    total-tensors: 2\n",
    );

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(format!("{:?}", err).contains("Boundary priority 5 does not appear"));
}

#[test]
fn test_missing_explicit_path_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let missing = dir.path().join("absent.yml");
    assert!(Config::load(Some(&missing)).is_err());
}
