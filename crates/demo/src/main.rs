//! A small build program: Compile → Link → Pack over a directory of text "sources".
//!
//! `kiln-demo` compiles every `*.txt` under `--source` into an object
//! directory, links the objects into one binary and packs the binary.
//! Run `kiln-demo --help` for the target and option tables.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use kiln_lib::dispatch::options::OptionSchema;
use kiln_lib::util::{Glob, copy_if_newer, hard_link_or_copy, is_out_of_date};
use kiln_lib::{Dispatcher, InvocationFailure, Memo, RebuildCheck, TargetOwner, TargetTable};

struct Demo {
  memo: Memo,
  source: PathBuf,
  out: PathBuf,
  configuration: String,
}

impl Default for Demo {
  fn default() -> Self {
    Self {
      memo: Memo::new(),
      source: PathBuf::from("sources"),
      out: PathBuf::from("build"),
      configuration: "Debug".to_string(),
    }
  }
}

impl Demo {
  fn obj_dir(&self) -> PathBuf {
    self.out.join("obj")
  }

  /// Copy changed sources into the object directory; returns the objects in name order.
  async fn compile(&self) -> Result<Vec<PathBuf>, InvocationFailure> {
    self
      .memo
      .run("Compile", async {
        println!("Compile");
        let sources = Glob::new(&self.source).include("**/*.txt").collect()?;
        let mut objects = Vec::with_capacity(sources.len());
        for source in sources {
          let relative = source.strip_prefix(&self.source).unwrap_or(&source);
          let object = self.obj_dir().join(relative).with_extension("o");
          if copy_if_newer(&source, &object).with_context(|| format!("compiling {}", source.display()))? {
            info!(source = %source.display(), "compiled");
          }
          objects.push(object);
        }
        Ok(objects)
      })
      .await
  }

  /// Concatenate the objects into `<out>/<configuration>/app`.
  async fn link(&self) -> Result<PathBuf, InvocationFailure> {
    self
      .memo
      .run("Link", async {
        let objects = self.compile().await?;
        println!("Link");
        let binary = self.out.join(self.configuration.to_lowercase()).join("app");
        if is_out_of_date(&binary, &objects)? || objects.is_empty() {
          link_objects(&objects, &binary, &self.configuration)?;
          info!(binary = %binary.display(), objects = objects.len(), "linked");
        }
        Ok(binary)
      })
      .await
  }

  async fn pack(&self) -> Result<PathBuf, InvocationFailure> {
    self
      .memo
      .run("Pack", async {
        let binary = self.link().await?;
        println!("Pack");
        let package = self.out.join("pkg").join("app");
        hard_link_or_copy(&binary, &package).with_context(|| format!("packing {}", binary.display()))?;
        Ok(package)
      })
      .await
  }

  async fn clean(&self) -> Result<(), InvocationFailure> {
    self
      .memo
      .run("Clean", async {
        println!("Clean");
        if self.out.exists() {
          fs::remove_dir_all(&self.out).with_context(|| format!("removing {}", self.out.display()))?;
        }
        Ok(())
      })
      .await
  }
}

fn link_objects(objects: &[PathBuf], binary: &Path, configuration: &str) -> anyhow::Result<()> {
  let mut image = format!("# {} build\n", configuration);
  for object in objects {
    image.push_str(&fs::read_to_string(object).with_context(|| format!("reading {}", object.display()))?);
  }
  if let Some(parent) = binary.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(binary, image).with_context(|| format!("writing {}", binary.display()))?;
  Ok(())
}

impl TargetOwner for Demo {
  fn memo(&self) -> &Memo {
    &self.memo
  }

  fn targets(table: &mut TargetTable<Self>) {
    table
      .target("Compile", |d: Arc<Self>| async move { d.compile().await })
      .description("Compile the sources into objects");
    table
      .target("Link", |d: Arc<Self>| async move { d.link().await })
      .description("Link the objects into the binary");
    table
      .target("Pack", |d: Arc<Self>| async move { d.pack().await })
      .description("Package the binary")
      .as_default();
    table
      .target("Clean", |d: Arc<Self>| async move { d.clean().await })
      .description("Remove the output directory");
  }

  fn options(schema: &mut OptionSchema<Self>) {
    schema
      .string("source", "Directory holding the sources", |d, v| d.source = PathBuf::from(v))
      .short('s');
    schema
      .string("out", "Output directory", |d, v| d.out = PathBuf::from(v))
      .short('o');
    schema
      .choice(
        "configuration",
        &["Debug", "Release"],
        "Build configuration",
        |d, v| d.configuration = v,
      )
      .short('c');
  }
}

fn main() {
  Dispatcher::new("kiln-demo")
    .self_rebuild(RebuildCheck::new(env!("CARGO_MANIFEST_DIR")))
    .main(|_| Demo::default())
}
