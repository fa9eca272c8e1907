//! Self-rebuild protocol.
//!
//! A build program compares its own executable against the sources it was
//! compiled from. When any source is at least as new as the executable the
//! program does no work and exits with [`EXIT_STALE`](crate::consts::EXIT_STALE);
//! the `kiln` launcher then recompiles and runs it again with the same
//! arguments. Nothing is persisted between runs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::consts::NO_REBUILD_ENV;
use crate::util::fs::{modified, newest_modification};
use crate::util::glob::{Glob, GlobError};

/// Files that feed the build program's own binary. Tests, examples and benches
/// are left out: `cargo build --bin` does not relink when they change.
pub const DEFAULT_INCLUDES: [&str; 3] = ["src/**/*.rs", "build.rs", "Cargo.toml"];
pub const DEFAULT_EXCLUDES: [&str; 2] = ["target/**", ".git/**"];

#[derive(Debug, Error)]
pub enum RebuildError {
  #[error("cannot locate the running executable: {0}")]
  CurrentExe(#[source] io::Error),

  #[error(transparent)]
  Glob(#[from] GlobError),

  #[error("cannot read modification time of {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
  Fresh,
  /// `source` is the newest source file, not older than the artifact.
  Stale { artifact: PathBuf, source: PathBuf },
}

impl Staleness {
  pub fn is_stale(&self) -> bool {
    matches!(self, Staleness::Stale { .. })
  }
}

/// Which sources a build program was compiled from, and which file it was compiled into.
#[derive(Debug, Clone)]
pub struct RebuildCheck {
  sources: Glob,
  artifact: Option<PathBuf>,
}

impl RebuildCheck {
  /// Sources under `root` matching the default patterns; the artifact is the running executable.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let sources = DEFAULT_INCLUDES.iter().fold(Glob::new(root), |glob, p| glob.include(p));
    let sources = DEFAULT_EXCLUDES.iter().fold(sources, |glob, p| glob.exclude(p));
    Self {
      sources,
      artifact: None,
    }
  }

  pub fn include(mut self, pattern: &str) -> Self {
    self.sources = self.sources.include(pattern);
    self
  }

  pub fn exclude(mut self, pattern: &str) -> Self {
    self.sources = self.sources.exclude(pattern);
    self
  }

  /// Compare against `path` instead of the running executable.
  pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
    self.artifact = Some(path.into());
    self
  }

  /// True when `KILN_NO_REBUILD` is set to anything but empty or `0`.
  pub fn disabled() -> bool {
    std::env::var_os(NO_REBUILD_ENV).is_some_and(|value| !value.is_empty() && value != "0")
  }

  /// Compare the artifact against the newest source, strictly.
  pub fn check(&self) -> Result<Staleness, RebuildError> {
    let artifact = match &self.artifact {
      Some(path) => path.clone(),
      None => std::env::current_exe().map_err(RebuildError::CurrentExe)?,
    };

    let files = self.sources.files()?;
    let newest = newest_modification(files).map_err(|source| RebuildError::Io {
      path: self.sources.root().to_path_buf(),
      source,
    })?;
    let Some((source, source_time)) = newest else {
      debug!(root = %self.sources.root().display(), "no sources found");
      return Ok(Staleness::Fresh);
    };

    let built = modified(&artifact).map_err(|err| RebuildError::Io {
      path: artifact.clone(),
      source: err,
    })?;

    match built {
      Some(built) if built > source_time => {
        debug!(artifact = %artifact.display(), newest = %source.display(), "artifact is up to date");
        Ok(Staleness::Fresh)
      }
      _ => Ok(Staleness::Stale { artifact, source }),
    }
  }
}
