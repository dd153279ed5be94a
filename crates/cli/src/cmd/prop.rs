use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Subcommand;

use super::Session;
use crate::output::print_success;

#[derive(Subcommand, Debug)]
pub enum PropCommand {
  /// Print the evaluated value of a property
  Get {
    name: String,

    /// Evaluate for this configuration instead of the project-wide value
    #[arg(short, long)]
    config: Option<String>,
  },

  /// Write a property and save the project
  Set {
    name: String,
    value: String,

    /// Write into this configuration's property group
    #[arg(short, long)]
    config: Option<String>,
  },
}

pub fn cmd_prop(project: Option<&Path>, command: PropCommand) -> Result<()> {
  let session = Session::open(project)?;

  match command {
    PropCommand::Get { name, config } => {
      let value = match config {
        Some(raw) => {
          let key = session.configuration_key(Some(&raw))?;
          session.node.configuration(&key).get_configuration_property(&name, false)
        }
        None => session.node.get_project_property(&name, false),
      };
      match value {
        Some(value) => println!("{value}"),
        None => bail!("Property '{name}' is not defined"),
      }
      Ok(())
    }
    PropCommand::Set { name, value, config } => {
      match config {
        Some(raw) => {
          let key = session.configuration_key(Some(&raw))?;
          session
            .node
            .configuration(&key)
            .set_configuration_property(&name, &value)
            .with_context(|| format!("Failed to set '{name}' for {key}"))?;
          print_success(&format!("{name} = {value} ({key})"));
        }
        None => {
          session
            .node
            .set_project_property(&name, &value)
            .with_context(|| format!("Failed to set '{name}'"))?;
          print_success(&format!("{name} = {value}"));
        }
      }
      session.save()
    }
  }
}
