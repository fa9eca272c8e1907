//! Running external programs from target bodies.
//!
//! A non-zero exit is not an error by itself: [`ProcessOutput`] carries the
//! exit code, and [`ProcessOutput::check`] turns a failure into a
//! [`ProcessError`] for bodies that want the `?` shorthand.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{program} exited with {}{}", code.map_or("a signal".to_string(), |c| format!("code {c}")), stderr_suffix(stderr))]
  Failed {
    program: String,
    code: Option<i32>,
    stderr: String,
  },
}

fn stderr_suffix(stderr: &str) -> String {
  if stderr.is_empty() {
    String::new()
  } else {
    format!(": {}", stderr)
  }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
  pub program: String,
  /// `None` when the process was killed by a signal.
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }

  /// The output itself on exit code zero, [`ProcessError::Failed`] otherwise.
  pub fn check(self) -> Result<Self, ProcessError> {
    if self.success() {
      Ok(self)
    } else {
      Err(ProcessError::Failed {
        program: self.program,
        code: self.exit_code,
        stderr: self.stderr.trim().to_string(),
      })
    }
  }

  /// Trimmed standard output.
  pub fn stdout_trimmed(&self) -> &str {
    self.stdout.trim()
  }
}

/// A process to run: program, arguments, working directory and extra environment.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
  program: OsString,
  args: Vec<OsString>,
  cwd: Option<PathBuf>,
  env: BTreeMap<OsString, OsString>,
}

impl ProcessSpec {
  pub fn new(program: impl Into<OsString>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  /// Run a command line through the platform shell.
  pub fn shell(command: &str) -> Self {
    #[cfg(unix)]
    {
      Self::new("/bin/sh").arg("-c").arg(command)
    }

    #[cfg(windows)]
    {
      Self::new("powershell.exe")
        .args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"])
        .arg(command)
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn program(&self) -> &OsStr {
    &self.program
  }

  pub fn arguments(&self) -> &[OsString] {
    &self.args
  }

  pub fn working_dir(&self) -> Option<&Path> {
    self.cwd.as_deref()
  }

  fn display_name(&self) -> String {
    self.program.to_string_lossy().into_owned()
  }

  /// Run to completion, capturing stdout and stderr.
  pub async fn run(&self) -> Result<ProcessOutput, ProcessError> {
    let program = self.display_name();
    info!(program = %program, args = ?self.args, "running process");

    let mut command = Command::new(&self.program);
    command.args(&self.args).envs(&self.env).kill_on_drop(true);
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }

    debug!(program = %program, cwd = ?self.cwd, "spawning process");
    let output = command.output().await.map_err(|source| ProcessError::Spawn {
      program: program.clone(),
      source,
    })?;

    let result = ProcessOutput {
      program,
      exit_code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.success() {
      debug!(program = %result.program, code = ?result.exit_code, stderr = %result.stderr, "process failed");
    }
    Ok(result)
  }
}

/// Run `program` with `args` in the current directory.
pub async fn run_process<I, S>(program: &str, args: I) -> Result<ProcessOutput, ProcessError>
where
  I: IntoIterator<Item = S>,
  S: Into<OsString>,
{
  ProcessSpec::new(program).args(args).run().await
}
