//! Shared owners and helpers for engine integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kiln_lib::dispatch::options::OptionSchema;
use kiln_lib::{Dispatcher, InvocationFailure, Memo, RunContext, RunStatus, TargetOwner, TargetTable};

/// Compile → Link → Pack, plus a `Test` target keyed by a filter.
#[derive(Default)]
pub struct Pipeline {
  memo: Memo,
  ran: Mutex<Vec<String>>,
  pub out_dir: String,
  pub fail: Option<String>,
  pub optimize: bool,
}

impl Pipeline {
  pub fn failing_at(step: &str) -> Self {
    Self {
      fail: Some(step.to_string()),
      ..Self::default()
    }
  }

  pub fn ran(&self) -> Vec<String> {
    self.ran.lock().unwrap().clone()
  }

  fn step(&self, name: &str) -> anyhow::Result<()> {
    if self.fail.as_deref() == Some(name) {
      anyhow::bail!("{} exploded", name);
    }
    self.ran.lock().unwrap().push(name.to_string());
    Ok(())
  }

  pub async fn compile(&self) -> Result<(), InvocationFailure> {
    self
      .memo
      .run("Compile", async {
        tokio::task::yield_now().await;
        self.step("Compile")
      })
      .await
  }

  pub async fn link(&self) -> Result<PathBuf, InvocationFailure> {
    self
      .memo
      .run("Link", async {
        self.compile().await?;
        self.step("Link")?;
        Ok(PathBuf::from(&self.out_dir).join("app"))
      })
      .await
  }

  pub async fn pack(&self) -> Result<PathBuf, InvocationFailure> {
    self
      .memo
      .run("Pack", async {
        let binary = self.link().await?;
        self.step("Pack")?;
        Ok(binary.with_extension("tar"))
      })
      .await
  }

  pub async fn test(&self, filter: String) -> Result<(), InvocationFailure> {
    self
      .memo
      .run_with("Test", filter, |filter| async move {
        self.compile().await?;
        self.step(&format!("Test {}", filter))
      })
      .await
  }
}

impl TargetOwner for Pipeline {
  fn memo(&self) -> &Memo {
    &self.memo
  }

  fn targets(table: &mut TargetTable<Self>) {
    table
      .target("Compile", |p: Arc<Self>| async move { p.compile().await })
      .description("Compile sources");
    table
      .target("Link", |p: Arc<Self>| async move { p.link().await })
      .description("Link objects into the binary");
    table
      .target("Pack", |p: Arc<Self>| async move { p.pack().await })
      .description("Package the binary")
      .as_default();
    table
      .target_with_input("Test", |p: Arc<Self>, filter: String| async move { p.test(filter).await })
      .description("Run tests matching a filter");
  }

  fn options(schema: &mut OptionSchema<Self>) {
    schema
      .string("out-dir", "Output directory", |p, v| p.out_dir = v)
      .short('o');
    schema.string("fail", "Make a step fail", |p, v| p.fail = Some(v));
    schema.flag("optimize", "Optimize the build", |p, v| p.optimize = v);
  }
}

/// An owner without a default target.
#[derive(Default)]
pub struct Linter {
  memo: Memo,
}

impl TargetOwner for Linter {
  fn memo(&self) -> &Memo {
    &self.memo
  }

  fn targets(table: &mut TargetTable<Self>) {
    table.target("Lint", |l: Arc<Self>| async move { l.memo.run("Lint", async { Ok(()) }).await });
  }
}

/// Targets whose bodies do not touch the memo themselves; `match_substrings` is on.
#[derive(Default)]
pub struct Site {
  memo: Memo,
  pub renders: AtomicUsize,
  pub previews: Mutex<Vec<u16>>,
}

impl Site {
  pub fn renders(&self) -> usize {
    self.renders.load(Ordering::SeqCst)
  }
}

impl TargetOwner for Site {
  fn memo(&self) -> &Memo {
    &self.memo
  }

  fn targets(table: &mut TargetTable<Self>) {
    table
      .target("Render", |s: Arc<Self>| async move {
        s.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
      })
      .as_default();
    table.target_with_input("LivePreview", |s: Arc<Self>, port: u16| async move {
      s.previews.lock().unwrap().push(port);
      Ok(port)
    });
    table.match_substrings();
  }
}

pub struct Run<O> {
  pub status: RunStatus,
  pub out: String,
  pub err: String,
  pub owner: Option<Arc<O>>,
}

pub fn args(list: &[&str]) -> Vec<String> {
  list.iter().map(|s| s.to_string()).collect()
}

/// Dispatch `list` against a fresh owner and capture everything observable.
pub async fn dispatch_with<O, F>(dispatcher: &Dispatcher, list: &[&str], create: F) -> Run<O>
where
  O: TargetOwner,
  F: FnOnce() -> O,
{
  let mut out = Vec::new();
  let mut err = Vec::new();
  let mut context: Option<Arc<RunContext>> = None;

  let status = dispatcher
    .run(
      &args(list),
      |ctx| {
        context = Some(Arc::clone(ctx));
        create()
      },
      &mut out,
      &mut err,
    )
    .await;

  Run {
    status,
    out: String::from_utf8(out).unwrap(),
    err: String::from_utf8(err).unwrap(),
    owner: context.and_then(|ctx| ctx.existing::<O, _>(())),
  }
}

pub async fn dispatch(list: &[&str]) -> Run<Pipeline> {
  dispatch_with(&Dispatcher::new("pipeline"), list, Pipeline::default).await
}

impl Run<Pipeline> {
  pub fn ran(&self) -> Vec<String> {
    self.owner.as_ref().map(|owner| owner.ran()).unwrap_or_default()
  }
}
