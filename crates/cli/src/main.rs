mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{ConfigsCommand, PropCommand};
use crate::output::{OutputFormat, print_error};

/// projsys - build and configure projects from the terminal
#[derive(Parser)]
#[command(name = "projsys")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Project file (default: the only *.projsys.json in the current directory)
  #[arg(short, long, global = true)]
  project: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the project
  Build {
    /// Configuration as `Config|Platform` (default: the active configuration)
    #[arg(short, long)]
    config: Option<String>,

    /// Targets to build, separated by `;` (default: the project's default targets)
    #[arg(short, long)]
    target: Option<String>,

    /// Build on the engine's workers and wait for the completion
    #[arg(long = "async")]
    run_async: bool,

    /// How long to wait for an async build (e.g., "30s", "5m")
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10m")]
    timeout: Duration,
  },

  /// Clean, then build the project
  Rebuild {
    #[arg(short, long)]
    config: Option<String>,
  },

  /// Clean the project
  Clean {
    #[arg(short, long)]
    config: Option<String>,
  },

  /// Manage configurations and platforms
  Configs {
    #[command(subcommand)]
    command: ConfigsCommand,
  },

  /// Read or write project properties
  Prop {
    #[command(subcommand)]
    command: PropCommand,
  },

  /// List output groups, or the outputs of one group
  Outputs {
    #[arg(short, long)]
    config: Option<String>,

    /// Output group to enumerate (e.g., "Built")
    #[arg(short, long)]
    group: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show how the project would be started
  Launch {
    #[arg(short, long)]
    config: Option<String>,

    /// Start without debugging
    #[arg(long)]
    no_debug: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Rename a project item, moving the file on disk
  Rename {
    /// Current path of the item
    old: PathBuf,

    /// New path of the item
    new: PathBuf,
  },
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli) {
    print_error(&format!("{e:#}"));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let project = cli.project.as_deref();
  match cli.command {
    Commands::Build {
      config,
      target,
      run_async,
      timeout,
    } => cmd::cmd_build(project, config.as_deref(), target.as_deref(), run_async, timeout),
    Commands::Rebuild { config } => cmd::cmd_rebuild(project, config.as_deref()),
    Commands::Clean { config } => cmd::cmd_clean(project, config.as_deref()),
    Commands::Configs { command } => cmd::cmd_configs(project, command),
    Commands::Prop { command } => cmd::cmd_prop(project, command),
    Commands::Outputs { config, group, output } => {
      cmd::cmd_outputs(project, config.as_deref(), group.as_deref(), output)
    }
    Commands::Launch {
      config,
      no_debug,
      output,
    } => cmd::cmd_launch(project, config.as_deref(), no_debug, output),
    Commands::Rename { old, new } => cmd::cmd_rename(project, &old, &new),
  }
}
