use std::path::Path;

use anyhow::{Context, Result};

use projsys_lib::project::{DebugEngine, LaunchFlags};

use super::Session;
use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_launch(project: Option<&Path>, config: Option<&str>, no_debug: bool, output: OutputFormat) -> Result<()> {
  let session = Session::open(project)?;
  let key = session.configuration_key(config)?;
  let info = session
    .node
    .configuration(&key)
    .derive_launch_info(LaunchFlags { no_debug })
    .with_context(|| format!("Cannot start {key}"))?;

  let engine = match info.debug_engine {
    DebugEngine::Managed => "managed",
    DebugEngine::Mixed => "mixed",
  };
  if output.is_json() {
    return print_json(&serde_json::json!({
      "executable": info.executable,
      "arguments": info.arguments,
      "working_directory": info.working_directory,
      "debug_engine": engine,
      "remote_machine": info.remote_machine,
      "no_debug": info.no_debug,
    }));
  }

  print_stat("Executable", &info.executable.display().to_string());
  print_stat("Arguments", &info.arguments);
  print_stat("Working directory", &info.working_directory.display().to_string());
  if !info.no_debug {
    print_stat("Debugger", engine);
  }
  if let Some(machine) = &info.remote_machine {
    print_stat("Remote machine", machine);
  }
  Ok(())
}
