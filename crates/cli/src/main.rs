mod bootstrap;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use kiln_lib::tools::Profile;

use crate::bootstrap::Launcher;
use crate::output::print_error;

/// kiln - compile a Rust build program and run it, rebuilding it when it is stale
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Directory of the build program's Cargo project
  #[arg(long, value_name = "DIR", default_value = ".")]
  project: PathBuf,

  /// Binary to build and run (defaults to the project directory's name)
  #[arg(long, value_name = "NAME")]
  bin: Option<String>,

  /// Compile the build program with the release profile
  #[arg(long)]
  release: bool,

  /// How many times a stale build program is recompiled before giving up
  #[arg(long, value_name = "N", default_value_t = 3)]
  max_rebuilds: u32,

  /// Arguments passed verbatim to the build program
  #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
  args: Vec<String>,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let cli = Cli::parse();
  match run(cli) {
    Ok(code) => std::process::exit(code),
    Err(e) => {
      print_error(&format!("{:#}", e));
      std::process::exit(1);
    }
  }
}

fn run(cli: Cli) -> Result<i32> {
  let profile = if cli.release { Profile::Release } else { Profile::Debug };
  let runtime = tokio::runtime::Runtime::new()?;
  runtime.block_on(async move {
    let launcher = Launcher::for_project(&cli.project, cli.bin, profile, cli.max_rebuilds).await?;
    debug!(artifact = %launcher.artifact().display(), "resolved build program");
    launcher.launch(&cli.args).await
  })
}
