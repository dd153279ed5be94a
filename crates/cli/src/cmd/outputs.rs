use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use super::Session;
use crate::output::{OutputFormat, print_info, print_json, symbols};

#[derive(Debug, Serialize)]
struct GroupEntry {
  name: String,
  target: String,
}

#[derive(Debug, Serialize)]
struct OutputEntry {
  path: String,
  display_name: String,
  is_key_output: bool,
}

pub fn cmd_outputs(project: Option<&Path>, config: Option<&str>, group: Option<&str>, output: OutputFormat) -> Result<()> {
  let session = Session::open(project)?;
  let key = session.configuration_key(config)?;
  let configuration = session.node.configuration(&key);

  let Some(group) = group else {
    let groups: Vec<GroupEntry> = configuration
      .output_groups()
      .iter()
      .map(|g| GroupEntry {
        name: g.name().to_string(),
        target: g.target_name().to_string(),
      })
      .collect();
    if output.is_json() {
      return print_json(&groups);
    }
    for entry in &groups {
      println!(
        "{} {}",
        entry.name,
        format!("({})", entry.target).if_supports_color(Stream::Stdout, |s| s.dimmed())
      );
    }
    return Ok(());
  };

  let outputs = configuration
    .enumerate_outputs(group)
    .with_context(|| format!("Failed to compute output group '{group}' for {key}"))?;
  let entries: Vec<OutputEntry> = outputs
    .iter()
    .map(|o| OutputEntry {
      path: o.canonical_name().display().to_string(),
      display_name: o.display_name().to_string(),
      is_key_output: o.is_key_output(),
    })
    .collect();

  if output.is_json() {
    return print_json(&entries);
  }
  if entries.is_empty() {
    print_info(&format!("Output group '{group}' is empty for {key}"));
    return Ok(());
  }
  for entry in &entries {
    let marker = if entry.is_key_output { symbols::KEY } else { " " };
    println!("{marker} {}", entry.path);
  }
  Ok(())
}
