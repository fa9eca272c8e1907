//! Compile-and-run loop for build programs.
//!
//! The launcher runs the compiled build program with the user's arguments and
//! inherited stdio. Exit code 2 means the program found itself older than its
//! sources: the launcher recompiles and runs it again with the same arguments.
//! Every other exit code is passed through.
//!
//! After each successful compile the artifact's modification time is bumped,
//! since Cargo leaves the binary untouched when a changed source does not
//! affect it and the program would otherwise keep reporting itself stale.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info};

use kiln_lib::consts::EXIT_STALE;
use kiln_lib::tools::cargo::artifact_in;
use kiln_lib::tools::{Cargo, Profile};
use kiln_lib::util::process::ProcessSpec;

use crate::output::{format_elapsed, print_step, print_success, print_warning};

pub struct Launcher {
  name: String,
  artifact: PathBuf,
  build: ProcessSpec,
  max_rebuilds: u32,
}

impl Launcher {
  /// Launch binary `bin` of the Cargo project in `project`.
  ///
  /// Without `bin`, the binary is named after the project directory. The
  /// artifact is located through `cargo metadata`, so members of a workspace
  /// resolve to the workspace's target directory.
  pub async fn for_project(
    project: &Path,
    bin: Option<String>,
    profile: Profile,
    max_rebuilds: u32,
  ) -> Result<Self> {
    let project = dunce::canonicalize(project).with_context(|| format!("project directory {}", project.display()))?;
    let bin = match bin {
      Some(bin) => bin,
      None => project
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("cannot derive a binary name from the project directory; pass --bin")?,
    };

    let cargo = Cargo::new(&project);
    let target_dir = match cargo.target_directory().await {
      Ok(dir) => dir,
      Err(err) => {
        debug!(error = %err, "cargo metadata unavailable, assuming the default target directory");
        cargo.default_target_dir()
      }
    };
    let mut build = cargo.build_spec(profile).arg("--bin").arg(&bin);
    if let Some(color) = std::env::var_os("CARGO_TERM_COLOR") {
      build = build.env("CARGO_TERM_COLOR", color);
    }

    let artifact = artifact_in(&target_dir, &bin, profile);
    Ok(Self::new(bin, artifact, build, max_rebuilds))
  }

  /// A launcher with an explicit artifact and build command.
  pub fn new(name: impl Into<String>, artifact: impl Into<PathBuf>, build: ProcessSpec, max_rebuilds: u32) -> Self {
    Self {
      name: name.into(),
      artifact: artifact.into(),
      build,
      max_rebuilds,
    }
  }

  pub fn artifact(&self) -> &Path {
    &self.artifact
  }

  /// Run the build program until it reports anything but stale; returns its exit code.
  pub async fn launch(&self, args: &[String]) -> Result<i32> {
    if !self.artifact.exists() {
      self.compile().await?;
    }

    let mut rebuilds = 0;
    loop {
      let code = self.run_artifact(args).await?;
      if code != EXIT_STALE {
        return Ok(code);
      }
      if rebuilds == self.max_rebuilds {
        bail!(
          "{} still reports stale sources after {} rebuild(s)",
          self.name,
          self.max_rebuilds
        );
      }
      rebuilds += 1;
      print_warning(&format!("{} is out of date, rebuilding", self.name));
      self.compile().await?;
    }
  }

  async fn compile(&self) -> Result<()> {
    print_step(&format!("compiling {}", self.name));
    let started = Instant::now();
    let output = self.build.run().await?;
    if !output.success() {
      eprint!("{}", output.stderr);
      bail!("failed to compile {}", self.name);
    }
    debug!(stderr = %output.stderr, "compiler output");
    self.mark_fresh()?;
    print_success(&format!(
      "compiled {} in {}",
      self.name,
      format_elapsed(started.elapsed())
    ));
    Ok(())
  }

  /// Stamp the artifact with the current time so it is newer than its sources.
  fn mark_fresh(&self) -> Result<()> {
    File::options()
      .write(true)
      .open(&self.artifact)
      .and_then(|file| file.set_modified(SystemTime::now()))
      .with_context(|| format!("compiling {} did not produce {}", self.name, self.artifact.display()))
  }

  async fn run_artifact(&self, args: &[String]) -> Result<i32> {
    info!(artifact = %self.artifact.display(), args = ?args, "running build program");
    let status = Command::new(&self.artifact)
      .args(args)
      .status()
      .await
      .with_context(|| format!("failed to run {}", self.artifact.display()))?;
    Ok(exit_code(status))
  }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
  use std::os::unix::process::ExitStatusExt;
  status
    .code()
    .or_else(|| status.signal().map(|signal| 128 + signal))
    .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
  status.code().unwrap_or(1)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use std::fs;
  use std::os::unix::fs::PermissionsExt;
  use std::time::Duration;
  use tempfile::TempDir;

  fn script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
  }

  fn build_count(temp: &TempDir) -> usize {
    fs::read_to_string(temp.path().join("builds"))
      .map(|log| log.lines().count())
      .unwrap_or(0)
  }

  /// A build step that logs itself and replaces the artifact with `body`.
  fn build_writing(temp: &TempDir, body: &str) -> ProcessSpec {
    let next = temp.path().join("next");
    script(&next, body);
    ProcessSpec::shell("echo built >> builds && cp next app && chmod +x app").cwd(temp.path())
  }

  fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[tokio::test]
  async fn exit_codes_pass_through() {
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("app");
    script(&artifact, "exit 64");
    let launcher = Launcher::new("app", &artifact, build_writing(&temp, "exit 0"), 3);

    assert_eq!(launcher.launch(&[]).await.unwrap(), 64);
    assert_eq!(build_count(&temp), 0);
  }

  #[tokio::test]
  async fn stale_program_is_rebuilt_and_rerun_with_same_arguments() {
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("app");
    script(&artifact, "exit 2");
    let record = temp.path().join("args");
    let build = build_writing(&temp, &format!("echo \"$@\" > {}", record.display()));
    let launcher = Launcher::new("app", &artifact, build, 3);

    let code = launcher.launch(&args(&["Pack", "--verbosity=quiet"])).await.unwrap();
    assert_eq!(code, 0);
    assert_eq!(build_count(&temp), 1);
    assert_eq!(fs::read_to_string(record).unwrap().trim(), "Pack --verbosity=quiet");
  }

  #[tokio::test]
  async fn missing_artifact_is_compiled_first() {
    let temp = TempDir::new().unwrap();
    let launcher = Launcher::new("app", temp.path().join("app"), build_writing(&temp, "exit 0"), 3);
    assert_eq!(launcher.launch(&[]).await.unwrap(), 0);
    assert_eq!(build_count(&temp), 1);
  }

  #[tokio::test]
  async fn rebuilds_are_bounded() {
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("app");
    script(&artifact, "exit 2");
    let launcher = Launcher::new("app", &artifact, build_writing(&temp, "exit 2"), 2);

    let err = launcher.launch(&[]).await.unwrap_err();
    assert_eq!(err.to_string(), "app still reports stale sources after 2 rebuild(s)");
    assert_eq!(build_count(&temp), 2);
  }

  #[tokio::test]
  async fn compile_failure_stops_the_launch() {
    let temp = TempDir::new().unwrap();
    let build = ProcessSpec::shell("echo 'error[E0425]: cannot find value' >&2; exit 101");
    let launcher = Launcher::new("app", temp.path().join("app"), build, 3);

    let err = launcher.launch(&[]).await.unwrap_err();
    assert_eq!(err.to_string(), "failed to compile app");
  }

  #[tokio::test]
  async fn compile_marks_the_artifact_fresh() {
    let temp = TempDir::new().unwrap();
    let artifact = temp.path().join("app");
    script(&artifact, "exit 0");
    let hour_ago = SystemTime::now() - Duration::from_secs(3600);
    File::options().write(true).open(&artifact).unwrap().set_modified(hour_ago).unwrap();

    let launcher = Launcher::new("app", &artifact, ProcessSpec::shell("true"), 3);
    launcher.compile().await.unwrap();

    let modified = fs::metadata(&artifact).unwrap().modified().unwrap();
    assert!(modified > hour_ago + Duration::from_secs(3000));
  }

  #[tokio::test]
  async fn compile_without_artifact_is_an_error() {
    let temp = TempDir::new().unwrap();
    let launcher = Launcher::new("app", temp.path().join("app"), ProcessSpec::shell("true"), 3);
    let err = launcher.compile().await.unwrap_err();
    assert!(err.to_string().starts_with("compiling app did not produce"));
  }

  #[tokio::test]
  async fn project_launcher_targets_cargo_output() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("tasks");
    fs::create_dir(&project).unwrap();

    let launcher = Launcher::for_project(&project, None, Profile::Release, 3).await.unwrap();
    assert!(launcher.artifact().ends_with("release/tasks"));

    let launcher = Launcher::for_project(&project, Some("ci".to_string()), Profile::Debug, 3)
      .await
      .unwrap();
    assert!(launcher.artifact().ends_with("debug/ci"));
  }

  #[tokio::test]
  async fn workspace_member_launches_from_the_workspace_target() {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    fs::write(root.join("Cargo.toml"), "[workspace]\nmembers = [\"tasks\"]\n").unwrap();
    let member = root.join("tasks");
    fs::create_dir_all(member.join("src")).unwrap();
    fs::write(
      member.join("Cargo.toml"),
      "[package]\nname = \"tasks\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
    )
    .unwrap();
    fs::write(member.join("src/main.rs"), "fn main() {}\n").unwrap();

    let launcher = Launcher::for_project(&member, None, Profile::Debug, 3).await.unwrap();
    let expected = match std::env::var_os("CARGO_TARGET_DIR") {
      Some(dir) if !dir.is_empty() => member.join(dir).join("debug"),
      _ => root.join("target").join("debug"),
    };
    assert_eq!(launcher.artifact().parent(), Some(expected.as_path()));
  }

  #[tokio::test]
  async fn missing_project_is_an_error() {
    let temp = TempDir::new().unwrap();
    let launched = Launcher::for_project(&temp.path().join("absent"), None, Profile::Debug, 3).await;
    assert!(launched.is_err());
  }
}
