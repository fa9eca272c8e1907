//! Cargo builds as memoized targets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::dispatch::abbrev::{Resolution, resolve};
use crate::memo::{InvocationFailure, Memo};
use crate::target::{TargetOwner, TargetTable};
use crate::util::process::ProcessSpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Profile {
  #[default]
  Debug,
  Release,
}

impl Profile {
  /// Name of the profile's directory under `target/`.
  pub fn dir_name(self) -> &'static str {
    match self {
      Profile::Debug => "debug",
      Profile::Release => "release",
    }
  }
}

impl fmt::Display for Profile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.dir_name())
  }
}

impl FromStr for Profile {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match resolve(s, ["debug", "release"], false) {
      Resolution::Unique(0) => Ok(Profile::Debug),
      Resolution::Unique(_) => Ok(Profile::Release),
      _ => Err(format!("unknown profile '{}', expected debug or release", s)),
    }
  }
}

/// A Cargo project; a single instance per manifest directory within a run.
pub struct Cargo {
  dir: PathBuf,
  memo: Memo,
}

impl Cargo {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      memo: Memo::new(),
    }
  }

  pub fn for_dir(ctx: &Arc<RunContext>, dir: impl Into<PathBuf>) -> Arc<Self> {
    ctx.owner(dir.into(), |_, dir| Self::new(dir))
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Guess at the build output directory without asking Cargo.
  ///
  /// Honors `CARGO_TARGET_DIR`, otherwise `target/` beside the manifest. Wrong
  /// for workspace members, whose output lands in the workspace root; prefer
  /// [`Cargo::target_directory`].
  pub fn default_target_dir(&self) -> PathBuf {
    match std::env::var_os("CARGO_TARGET_DIR") {
      Some(dir) if !dir.is_empty() => self.dir.join(dir),
      _ => self.dir.join("target"),
    }
  }

  /// The directory Cargo writes build output to, as reported by `cargo metadata`.
  pub async fn target_directory(&self) -> Result<PathBuf, InvocationFailure> {
    self
      .memo
      .run("TargetDir", async {
        let output = self
          .metadata_spec()
          .run()
          .await?
          .check()
          .with_context(|| format!("cargo metadata failed in {}", self.dir.display()))?;
        let dir = parse_target_directory(&output.stdout)?;
        debug!(dir = %dir.display(), "cargo target directory");
        Ok(dir)
      })
      .await
  }

  /// Where `cargo build` leaves the executable `bin` for `profile`.
  pub async fn artifact(&self, bin: &str, profile: Profile) -> Result<PathBuf, InvocationFailure> {
    Ok(artifact_in(&self.target_directory().await?, bin, profile))
  }

  fn metadata_spec(&self) -> ProcessSpec {
    ProcessSpec::new("cargo")
      .args(["metadata", "--format-version", "1", "--no-deps"])
      .cwd(&self.dir)
  }

  /// The `cargo build` command for `profile`, run in the manifest directory.
  pub fn build_spec(&self, profile: Profile) -> ProcessSpec {
    let spec = ProcessSpec::new("cargo").arg("build").cwd(&self.dir);
    match profile {
      Profile::Debug => spec,
      Profile::Release => spec.arg("--release"),
    }
  }

  pub async fn build(&self, profile: Profile) -> Result<(), InvocationFailure> {
    self
      .memo
      .run_with("Build", profile, |profile| async move {
        info!(dir = %self.dir.display(), profile = %profile, "cargo build");
        self
          .build_spec(profile)
          .run()
          .await?
          .check()
          .with_context(|| format!("cargo build failed in {}", self.dir.display()))?;
        Ok(())
      })
      .await
  }

  pub async fn test(&self) -> Result<(), InvocationFailure> {
    self
      .memo
      .run("Test", async {
        self.build(Profile::Debug).await?;
        ProcessSpec::new("cargo")
          .arg("test")
          .cwd(&self.dir)
          .run()
          .await?
          .check()
          .with_context(|| format!("cargo test failed in {}", self.dir.display()))?;
        Ok(())
      })
      .await
  }
}

/// The executable `bin` built with `profile` under `target_dir`.
pub fn artifact_in(target_dir: &Path, bin: &str, profile: Profile) -> PathBuf {
  target_dir
    .join(profile.dir_name())
    .join(format!("{}{}", bin, std::env::consts::EXE_SUFFIX))
}

#[derive(Deserialize)]
struct Metadata {
  target_directory: PathBuf,
}

/// Pull `target_directory` out of `cargo metadata --format-version 1` output.
pub fn parse_target_directory(json: &str) -> anyhow::Result<PathBuf> {
  let metadata: Metadata = serde_json::from_str(json).context("unreadable cargo metadata")?;
  Ok(metadata.target_directory)
}

impl TargetOwner for Cargo {
  fn memo(&self) -> &Memo {
    &self.memo
  }

  fn targets(table: &mut TargetTable<Self>) {
    table
      .target_with_input("Build", |cargo: Arc<Self>, profile: Profile| async move {
        cargo.build(profile).await
      })
      .description("Compile the project with the given profile");
    table
      .target("Test", |cargo: Arc<Self>| async move { cargo.test().await })
      .description("Build, then run the test suite")
      .as_default();
    table
      .target("TargetDir", |cargo: Arc<Self>| async move { cargo.target_directory().await })
      .description("Report the directory Cargo builds into");
  }
}
