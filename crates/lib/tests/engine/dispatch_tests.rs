//! Command-line dispatch against the pipeline owner.

use kiln_lib::{Dispatcher, RunStatus};

use super::common::{Linter, Site, dispatch, dispatch_with};

#[tokio::test]
async fn no_arguments_runs_the_default_chain_once() {
  let run = dispatch(&[]).await;
  assert_eq!(run.status, RunStatus::Success);
  assert_eq!(run.status.code(), 0);
  assert_eq!(run.ran(), vec!["Compile", "Link", "Pack"]);
  assert!(run.err.is_empty());
}

#[tokio::test]
async fn repeated_selections_collapse() {
  let run = dispatch(&["Compile", "Link", "comp", "Pack", "pa"]).await;
  assert_eq!(run.status, RunStatus::Success);
  assert_eq!(run.ran(), vec!["Compile", "Link", "Pack"]);
}

#[tokio::test]
async fn targets_run_in_the_order_given() {
  let run = dispatch(&["Test:unit", "Link", "Test:smoke"]).await;
  assert_eq!(run.status, RunStatus::Success);
  assert_eq!(run.ran(), vec!["Compile", "Test unit", "Link", "Test smoke"]);
}

#[tokio::test]
async fn options_are_bound_before_targets_run() {
  let run = dispatch(&["Link", "-odist", "--opt"]).await;
  assert_eq!(run.status, RunStatus::Success);
  let owner = run.owner.unwrap();
  assert_eq!(owner.out_dir, "dist");
  assert!(owner.optimize);
}

#[tokio::test]
async fn later_options_override_earlier_ones() {
  let run = dispatch(&["--out-dir=a", "--out-dir", "b", "Compile"]).await;
  assert_eq!(run.owner.unwrap().out_dir, "b");
}

#[tokio::test]
async fn failure_stops_the_run_with_one_line() {
  let run = dispatch(&["--fail=Link", "Pack", "Test:unit"]).await;
  assert_eq!(run.status, RunStatus::TargetFailed);
  assert_eq!(run.status.code(), 3);
  assert_eq!(run.err, "error: target Pack failed: Link exploded\n");
  assert_eq!(run.ran(), vec!["Compile"]);
}

#[tokio::test]
async fn help_lists_every_target() {
  let run = dispatch(&["--help"]).await;
  assert_eq!(run.status, RunStatus::HelpShown);
  assert_eq!(run.status.code(), 1);
  assert!(run.err.is_empty());
  assert!(run.owner.is_none());

  for line in [
    "Compile sources",
    "Link objects into the binary",
    "Package the binary (default)",
    "Test:<String>",
    "-o, --out-dir <value>",
    "--optimize",
  ] {
    assert!(run.out.contains(line), "help is missing {:?}:\n{}", line, run.out);
  }
}

#[tokio::test]
async fn help_wins_over_invalid_arguments() {
  let run = dispatch(&["Deploy", "--bogus", "-h"]).await;
  assert_eq!(run.status, RunStatus::HelpShown);
  assert!(run.err.is_empty());
}

#[tokio::test]
async fn unknown_target_is_a_usage_error() {
  let run = dispatch(&["Compile", "Deploy"]).await;
  assert_eq!(run.status, RunStatus::UsageError);
  assert_eq!(run.status.code(), 64);
  assert_eq!(run.err, "error: unknown target 'Deploy'\n");
  assert!(run.out.starts_with("Usage: pipeline"));
  assert!(run.owner.is_none());
}

#[tokio::test]
async fn unknown_option_is_a_usage_error() {
  let run = dispatch(&["--release"]).await;
  assert_eq!(run.status, RunStatus::UsageError);
  assert_eq!(run.err, "error: unknown option '--release'\n");
}

#[tokio::test]
async fn missing_input_is_a_usage_error() {
  let run = dispatch(&["Test"]).await;
  assert_eq!(run.status, RunStatus::UsageError);
  assert!(run.err.contains("requires an input of type String"));
}

#[tokio::test]
async fn missing_default_is_a_configuration_error() {
  let run = dispatch_with(&Dispatcher::new("lint"), &[], Linter::default).await;
  assert_eq!(run.status, RunStatus::UsageError);
  assert!(run.err.contains("default"));
  assert!(run.out.is_empty());

  let run = dispatch_with(&Dispatcher::new("lint"), &["lint"], Linter::default).await;
  assert_eq!(run.status, RunStatus::Success);
}

#[tokio::test]
async fn list_targets_describes_without_running() {
  let run = dispatch(&["--list-targets", "Pack"]).await;
  assert_eq!(run.status, RunStatus::HelpShown);
  assert!(run.owner.is_none());

  let listing: Vec<serde_json::Value> = serde_json::from_str(&run.out).unwrap();
  let names: Vec<&str> = listing.iter().map(|t| t["name"].as_str().unwrap()).collect();
  assert_eq!(names, vec!["Compile", "Link", "Pack", "Test"]);
  assert_eq!(listing[2]["is_default"], true);
  assert_eq!(listing[2]["result"], "PathBuf");
}

#[tokio::test]
async fn verbosity_never_changes_the_outcome() {
  for level in ["quiet", "min", "normal", "detailed"] {
    let run = dispatch(&["-v", level, "--fail=Pack"]).await;
    assert_eq!(run.status, RunStatus::TargetFailed, "verbosity {}", level);
    assert_eq!(run.ran(), vec!["Compile", "Link"]);
  }
}

#[tokio::test]
async fn registered_bodies_run_once_per_selection_key() {
  let run = dispatch_with(&Dispatcher::new("site"), &["Render", "Render", "ren"], Site::default).await;
  assert_eq!(run.status, RunStatus::Success);
  assert_eq!(run.owner.unwrap().renders(), 1);
}

#[tokio::test]
async fn registered_bodies_are_keyed_by_input() {
  let list = ["LivePreview:8080", "LivePreview:8081", "LivePreview:8080"];
  let run = dispatch_with(&Dispatcher::new("site"), &list, Site::default).await;
  assert_eq!(run.status, RunStatus::Success);
  assert_eq!(*run.owner.unwrap().previews.lock().unwrap(), vec![8080, 8081]);
}

#[tokio::test]
async fn unique_substring_selects_a_target_when_enabled() {
  let run = dispatch_with(&Dispatcher::new("site"), &["preview:3000"], Site::default).await;
  assert_eq!(run.status, RunStatus::Success);
  assert_eq!(*run.owner.unwrap().previews.lock().unwrap(), vec![3000]);

  let run = dispatch_with(&Dispatcher::new("site"), &["ender"], Site::default).await;
  assert_eq!(run.owner.unwrap().renders(), 1);
}

#[tokio::test]
async fn substrings_are_not_matched_by_default() {
  let run = dispatch(&["ink"]).await;
  assert_eq!(run.status, RunStatus::UsageError);
  assert_eq!(run.err, "error: unknown target 'ink'\n");
}
