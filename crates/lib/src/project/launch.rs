//! Debug launch information for one configuration.
//!
//! [`derive_launch_info`] reads the `Start*` configuration properties and the
//! project's `OutputType`. It performs no I/O; the output assembly path is
//! only asked for when the project itself is being started.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::property::{OutputType, parse_bool};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaunchError {
  #[error("a project with an output type of class library cannot be started directly")]
  ClassLibraryCannotBeStartedDirectly,

  #[error("no external program is set to start (StartProgram)")]
  MissingStartProgram,

  #[error("no URL is set to start (StartURL)")]
  MissingStartUrl,
}

/// What starting the configuration launches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartAction {
  /// The project's own output assembly.
  #[default]
  Project,
  /// An external program (`StartProgram`).
  Program,
  /// A browser pointed at `StartURL`.
  Url,
}

impl FromStr for StartAction {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "project" => Ok(StartAction::Project),
      "program" => Ok(StartAction::Program),
      "url" | "uri" => Ok(StartAction::Url),
      other => Err(format!("unknown start action '{other}'")),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebugEngine {
  #[default]
  Managed,
  /// Managed and native code (`EnableUnmanagedDebugging`).
  Mixed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchFlags {
  /// Start without attaching a debugger.
  pub no_debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchInfo {
  pub executable: PathBuf,
  pub arguments: String,
  pub working_directory: PathBuf,
  pub debug_engine: DebugEngine,
  pub remote_machine: Option<String>,
  pub no_debug: bool,
}

/// Inputs read by [`derive_launch_info`].
pub trait LaunchSource {
  fn configuration_property(&self, name: &str) -> Option<String>;

  /// Project-wide property, evaluated for the same configuration.
  fn project_property(&self, name: &str) -> Option<String>;

  fn project_dir(&self) -> PathBuf;

  /// Full path of the assembly the configuration builds.
  fn output_assembly(&self) -> PathBuf;

  /// Console shell used to keep the window open after a non-debug start.
  fn shell(&self) -> String;
}

pub fn derive_launch_info(source: &dyn LaunchSource, flags: LaunchFlags) -> Result<LaunchInfo, LaunchError> {
  let property = |name: &str| {
    source
      .configuration_property(name)
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
  };

  let action = match property("StartAction") {
    Some(raw) => raw.parse().unwrap_or_else(|e| {
      warn!(property = "StartAction", value = %raw, error = %e, "ignoring invalid property");
      StartAction::default()
    }),
    None => StartAction::default(),
  };
  let output_type = match source.project_property("OutputType") {
    Some(raw) if !raw.trim().is_empty() => raw.parse().unwrap_or_else(|e| {
      warn!(property = "OutputType", value = %raw, error = %e, "ignoring invalid property");
      OutputType::default()
    }),
    _ => OutputType::default(),
  };

  let executable = match action {
    StartAction::Project => {
      if !output_type.is_executable() {
        return Err(LaunchError::ClassLibraryCannotBeStartedDirectly);
      }
      source.output_assembly()
    }
    StartAction::Program => PathBuf::from(property("StartProgram").ok_or(LaunchError::MissingStartProgram)?),
    StartAction::Url => PathBuf::from(property("StartURL").ok_or(LaunchError::MissingStartUrl)?),
  };

  let arguments = property("StartArguments").unwrap_or_default();
  let working_directory = match property("StartWorkingDirectory") {
    Some(dir) => source.project_dir().join(dir),
    None if action == StartAction::Url => source.project_dir(),
    None => executable
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .map(Path::to_path_buf)
      .unwrap_or_else(|| source.project_dir()),
  };
  let remote_machine = property("RemoteDebugMachine");
  let debug_engine = match property("EnableUnmanagedDebugging").as_deref().and_then(parse_bool) {
    Some(true) => DebugEngine::Mixed,
    _ => DebugEngine::Managed,
  };

  let mut info = LaunchInfo {
    executable,
    arguments,
    working_directory,
    debug_engine,
    remote_machine,
    no_debug: flags.no_debug,
  };

  if action != StartAction::Url && output_type == OutputType::Exe && flags.no_debug && info.remote_machine.is_none() {
    info.arguments = format!(
      "/c \"\"{}\" {} & pause\"",
      info.executable.display(),
      escape_shell_metacharacters(&info.arguments)
    );
    info.executable = PathBuf::from(source.shell());
    debug!(shell = %info.executable.display(), "wrapping console launch to keep the window open");
  }

  Ok(info)
}

/// Escape `^ < > &` for the console shell. `^` goes first so later escapes are not doubled.
pub fn escape_shell_metacharacters(arguments: &str) -> String {
  arguments
    .replace('^', "^^")
    .replace('<', "^<")
    .replace('>', "^>")
    .replace('&', "^&")
}
