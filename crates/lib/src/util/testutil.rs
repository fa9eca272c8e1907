//! Test helpers for kiln-lib.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Create `path` (and its parents) if missing and set its modification time `age` in the past.
pub fn touch_aged(path: &Path, age: Duration) {
  set_modified(path, SystemTime::now() - age);
}

/// Create `path` if missing and set its modification time `ahead` in the future.
pub fn touch_ahead(path: &Path, ahead: Duration) {
  set_modified(path, SystemTime::now() + ahead);
}

fn set_modified(path: &Path, time: SystemTime) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  if !path.exists() {
    fs::write(path, path.to_string_lossy().as_bytes()).unwrap();
  }
  let file = fs::File::options().write(true).open(path).unwrap();
  file.set_modified(time).unwrap();
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}
