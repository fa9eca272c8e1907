//! The self-rebuild check in front of dispatch.

use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use serial_test::serial;
use tempfile::TempDir;

use kiln_lib::consts::NO_REBUILD_ENV;
use kiln_lib::{Dispatcher, RebuildCheck, RunStatus};

use super::common::{Pipeline, dispatch_with};

fn touch(path: &Path, time: SystemTime) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, "fn main() {}").unwrap();
  File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

/// A project whose artifact is `artifact_age` old and whose newest source is `source_age` old.
fn project(source_age: u64, artifact_age: u64) -> (TempDir, Dispatcher) {
  let temp = TempDir::new().unwrap();
  let now = SystemTime::now();
  touch(&temp.path().join("src/main.rs"), now - Duration::from_secs(source_age));
  let artifact = temp.path().join("target/debug/pipeline");
  touch(&artifact, now - Duration::from_secs(artifact_age));

  let check = RebuildCheck::new(temp.path()).artifact(artifact);
  (temp, Dispatcher::new("pipeline").self_rebuild(check))
}

fn run(dispatcher: &Dispatcher, args: &[&str]) -> super::common::Run<Pipeline> {
  let runtime = tokio::runtime::Runtime::new().unwrap();
  runtime.block_on(dispatch_with(dispatcher, args, Pipeline::default))
}

#[test]
#[serial]
fn stale_program_does_no_work() {
  temp_env::with_var_unset(NO_REBUILD_ENV, || {
    let (_temp, dispatcher) = project(10, 60);
    let run = run(&dispatcher, &["Pack"]);
    assert_eq!(run.status, RunStatus::Stale);
    assert_eq!(run.status.code(), 2);
    assert!(run.owner.is_none());
    assert!(run.err.contains("rebuild required"));
    assert!(run.out.is_empty());
  });
}

#[test]
#[serial]
fn stale_check_precedes_help() {
  temp_env::with_var_unset(NO_REBUILD_ENV, || {
    let (_temp, dispatcher) = project(10, 60);
    assert_eq!(run(&dispatcher, &["--help"]).status, RunStatus::Stale);
  });
}

#[test]
#[serial]
fn fresh_program_proceeds() {
  temp_env::with_var_unset(NO_REBUILD_ENV, || {
    let (_temp, dispatcher) = project(60, 10);
    let run = run(&dispatcher, &[]);
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.ran(), vec!["Compile", "Link", "Pack"]);
  });
}

#[test]
#[serial]
fn rebuild_check_can_be_disabled() {
  temp_env::with_var(NO_REBUILD_ENV, Some("1"), || {
    let (_temp, dispatcher) = project(10, 60);
    assert_eq!(run(&dispatcher, &["Compile"]).status, RunStatus::Success);
  });
}
