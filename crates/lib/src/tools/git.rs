//! Git repository queries as memoized targets.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::context::RunContext;
use crate::memo::{InvocationFailure, Memo};
use crate::target::{TargetOwner, TargetTable};
use crate::util::process::ProcessSpec;

/// One repository; a single instance per directory within a run.
pub struct Git {
  dir: PathBuf,
  memo: Memo,
}

impl Git {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      memo: Memo::new(),
    }
  }

  /// The run's instance for `dir`.
  pub fn for_dir(ctx: &Arc<RunContext>, dir: impl Into<PathBuf>) -> Arc<Self> {
    ctx.owner(dir.into(), |_, dir| Self::new(dir))
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Full commit id of `HEAD`.
  pub async fn head(&self) -> Result<String, InvocationFailure> {
    self.memo.run("Head", self.git(&["rev-parse", "HEAD"])).await
  }

  /// `git describe --tags --always --dirty`.
  pub async fn describe(&self) -> Result<String, InvocationFailure> {
    self
      .memo
      .run("Describe", self.git(&["describe", "--tags", "--always", "--dirty"]))
      .await
  }

  /// Whether the work tree has uncommitted changes, untracked files included.
  pub async fn is_dirty(&self) -> Result<bool, InvocationFailure> {
    self
      .memo
      .run("IsDirty", async {
        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
      })
      .await
  }

  async fn git(&self, args: &[&str]) -> anyhow::Result<String> {
    let output = ProcessSpec::new("git")
      .args(args)
      .cwd(&self.dir)
      .run()
      .await?
      .check()
      .with_context(|| format!("git {} in {}", args.join(" "), self.dir.display()))?;
    Ok(output.stdout_trimmed().to_string())
  }
}

impl TargetOwner for Git {
  fn memo(&self) -> &Memo {
    &self.memo
  }

  fn targets(table: &mut TargetTable<Self>) {
    table
      .target("Head", |git: Arc<Self>| async move { git.head().await })
      .description("Print the commit id of HEAD");
    table
      .target("Describe", |git: Arc<Self>| async move { git.describe().await })
      .description("Describe HEAD by its nearest tag")
      .as_default();
    table
      .target("IsDirty", |git: Arc<Self>| async move { git.is_dirty().await })
      .description("Report uncommitted changes");
  }
}
