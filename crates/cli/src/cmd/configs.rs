use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use super::Session;
use crate::output::{OutputFormat, print_info, print_json, print_success};
use crate::prompts::confirm;

#[derive(Subcommand, Debug)]
pub enum ConfigsCommand {
  /// List configurations and platforms
  List {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Add a configuration for every platform
  Add {
    name: String,

    /// Copy properties from this configuration
    #[arg(long)]
    clone_from: Option<String>,
  },

  /// Delete a configuration
  Delete {
    name: String,

    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,
  },

  /// Rename a configuration
  Rename { old: String, new: String },

  /// Add a platform for every configuration
  AddPlatform {
    name: String,

    /// Copy properties from this platform
    #[arg(long)]
    clone_from: Option<String>,
  },

  /// Delete a platform
  DeletePlatform {
    name: String,

    /// Skip confirmation prompt
    #[arg(long)]
    force: bool,
  },
}

#[derive(Debug, Serialize)]
struct Listing {
  active: String,
  configurations: Vec<String>,
  platforms: Vec<String>,
}

pub fn cmd_configs(project: Option<&Path>, command: ConfigsCommand) -> Result<()> {
  let session = Session::open(project)?;
  let registry = session.node.registry();

  match command {
    ConfigsCommand::List { output } => {
      let active = session.node.active_configuration();
      let listing = Listing {
        active: active.to_string(),
        configurations: registry.configurations().iter().map(ToString::to_string).collect(),
        platforms: registry.platform_names(),
      };
      if output.is_json() {
        return print_json(&listing);
      }
      for key in &registry.configurations() {
        let marker = if *key == active { "*" } else { " " };
        println!("{marker} {key}");
      }
      return Ok(());
    }
    ConfigsCommand::Add { name, clone_from } => {
      registry
        .add_configuration(&name, clone_from.as_deref())
        .with_context(|| format!("Failed to add configuration '{name}'"))?;
      print_success(&format!("Added configuration {name}"));
    }
    ConfigsCommand::Delete { name, force } => {
      if !confirm(&format!("Delete configuration '{name}'?"), force)? {
        print_info("Nothing deleted");
        return Ok(());
      }
      registry
        .delete_configuration(&name)
        .with_context(|| format!("Failed to delete configuration '{name}'"))?;
      print_success(&format!("Deleted configuration {name}"));
    }
    ConfigsCommand::Rename { old, new } => {
      registry
        .rename_configuration(&old, &new)
        .with_context(|| format!("Failed to rename configuration '{old}'"))?;
      print_success(&format!("Renamed configuration {old} to {new}"));
    }
    ConfigsCommand::AddPlatform { name, clone_from } => {
      registry
        .add_platform(&name, clone_from.as_deref())
        .with_context(|| format!("Failed to add platform '{name}'"))?;
      print_success(&format!("Added platform {name}"));
    }
    ConfigsCommand::DeletePlatform { name, force } => {
      if !confirm(&format!("Delete platform '{name}'?"), force)? {
        print_info("Nothing deleted");
        return Ok(());
      }
      registry
        .delete_platform(&name)
        .with_context(|| format!("Failed to delete platform '{name}'"))?;
      print_success(&format!("Deleted platform {name}"));
    }
  }

  session.save()
}
