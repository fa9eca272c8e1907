//! Console help: a usage line, the target table and the option table.

use crate::dispatch::options::{OptionKind, OptionSchema};
use crate::target::TargetTable;

/// Render the help text shown by `--help` and after usage errors.
pub fn render<O>(program: &str, table: &TargetTable<O>, schema: &OptionSchema<O>) -> String {
  let mut text = format!("Usage: {} [options] [targets...]\n", program);

  let targets: Vec<(String, String)> = table
    .entries()
    .iter()
    .map(|entry| {
      let descriptor = entry.descriptor();
      let left = match &descriptor.input {
        Some(input) => format!("{}:<{}>", descriptor.name, input),
        None => descriptor.name.clone(),
      };
      let right = match (descriptor.is_default, descriptor.description.is_empty()) {
        (true, true) => "(default)".to_string(),
        (true, false) => format!("{} (default)", descriptor.description),
        (false, _) => descriptor.description.clone(),
      };
      (left, right)
    })
    .collect();

  let mut options = vec![
    ("-h, --help".to_string(), "Show this help and exit".to_string()),
    (
      "-v, --verbosity <level>".to_string(),
      "Diagnostic output: quiet, minimal, normal, detailed".to_string(),
    ),
    (
      "    --list-targets".to_string(),
      "Print the targets as JSON and exit".to_string(),
    ),
  ];
  for spec in schema.specs() {
    let flags = match spec.short {
      Some(short) => format!("-{}, --{}", short, spec.long),
      None => format!("    --{}", spec.long),
    };
    let left = match &spec.kind {
      OptionKind::Bool => flags,
      OptionKind::String => format!("{} <value>", flags),
      OptionKind::Choice(values) => format!("{} <{}>", flags, values.join("|")),
    };
    options.push((left, spec.description.clone()));
  }

  text.push_str("\nTargets:\n");
  if targets.is_empty() {
    text.push_str("  (none)\n");
  } else {
    text.push_str(&columns(&targets));
  }
  text.push_str("\nOptions:\n");
  text.push_str(&columns(&options));
  text
}

fn columns(rows: &[(String, String)]) -> String {
  let width = rows.iter().map(|(left, _)| left.chars().count()).max().unwrap_or(0);
  rows
    .iter()
    .map(|(left, right)| {
      if right.is_empty() {
        format!("  {}\n", left)
      } else {
        format!("  {:<width$}  {}\n", left, right, width = width)
      }
    })
    .collect()
}
