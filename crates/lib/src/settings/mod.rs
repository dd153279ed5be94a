//! Process-wide settings.
//!
//! Values come from `PROJSYS_*` environment variables, falling back to
//! `settings.json` in the config directory, then to defaults. A value that
//! does not parse is logged and ignored.

pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::build::Verbosity;
use crate::engine::EngineOptions;
use crate::property::parse_bool;

pub const WORKER_THREADS_VAR: &str = "PROJSYS_WORKER_THREADS";
pub const VERBOSITY_VAR: &str = "PROJSYS_VERBOSITY";
pub const SHELL_VAR: &str = "PROJSYS_SHELL";
pub const TASK_SHELL_VAR: &str = "PROJSYS_TASK_SHELL";
pub const HOST_BUILD_MANAGER_VAR: &str = "PROJSYS_HOST_BUILD_MANAGER";

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  /// Build engine worker pool size; `None` uses the available parallelism.
  pub worker_threads: Option<usize>,
  pub verbosity: Verbosity,
  /// Console shell wrapping a non-debug launch.
  pub shell: String,
  /// Shell running `exec` tasks; `None` picks the platform default.
  pub task_shell: Option<String>,
  /// Route builds through the in-process host build manager.
  pub host_build_manager: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      worker_threads: None,
      verbosity: Verbosity::default(),
      shell: std::env::var("ComSpec").unwrap_or_else(|_| "cmd.exe".to_string()),
      task_shell: None,
      host_build_manager: true,
    }
  }
}

/// `settings.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
  pub worker_threads: Option<usize>,
  pub verbosity: Option<Verbosity>,
  pub shell: Option<String>,
  pub task_shell: Option<String>,
  pub host_build_manager: Option<bool>,
}

impl SettingsFile {
  pub fn read(path: &Path) -> Result<Self, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

impl Settings {
  /// Settings from the environment and the default settings file.
  pub fn load() -> Self {
    Self::load_from(paths::settings_file().as_deref())
  }

  /// Settings from the environment and `file`, if it exists.
  pub fn load_from(file: Option<&Path>) -> Self {
    let mut settings = Self::default();
    if let Some(path) = file
      && path.is_file()
    {
      match SettingsFile::read(path) {
        Ok(file) => settings.apply_file(file),
        Err(e) => warn!(error = %e, "ignoring settings file"),
      }
    }
    settings.apply_env();
    debug!(?settings, "settings loaded");
    settings
  }

  pub fn engine_options(&self) -> EngineOptions {
    EngineOptions {
      worker_threads: self.worker_threads,
      shell: self.task_shell.clone(),
    }
  }

  fn apply_file(&mut self, file: SettingsFile) {
    if let Some(threads) = file.worker_threads {
      self.set_worker_threads(threads, "settings file");
    }
    if let Some(verbosity) = file.verbosity {
      self.verbosity = verbosity;
    }
    if let Some(shell) = file.shell {
      self.shell = shell;
    }
    if file.task_shell.is_some() {
      self.task_shell = file.task_shell;
    }
    if let Some(host) = file.host_build_manager {
      self.host_build_manager = host;
    }
  }

  fn apply_env(&mut self) {
    if let Some(raw) = env(WORKER_THREADS_VAR) {
      match raw.trim().parse::<usize>() {
        Ok(threads) => self.set_worker_threads(threads, WORKER_THREADS_VAR),
        Err(_) => warn!(var = WORKER_THREADS_VAR, value = %raw, "ignoring invalid worker count"),
      }
    }
    if let Some(raw) = env(VERBOSITY_VAR) {
      match raw.parse::<Verbosity>() {
        Ok(verbosity) => self.verbosity = verbosity,
        Err(e) => warn!(var = VERBOSITY_VAR, error = %e, "ignoring invalid verbosity"),
      }
    }
    if let Some(shell) = env(SHELL_VAR) {
      self.shell = shell;
    }
    if let Some(shell) = env(TASK_SHELL_VAR) {
      self.task_shell = Some(shell);
    }
    if let Some(raw) = env(HOST_BUILD_MANAGER_VAR) {
      match parse_bool(&raw) {
        Some(enabled) => self.host_build_manager = enabled,
        None => warn!(var = HOST_BUILD_MANAGER_VAR, value = %raw, "ignoring invalid switch"),
      }
    }
  }

  fn set_worker_threads(&mut self, threads: usize, origin: &str) {
    if threads == 0 {
      warn!(origin, "ignoring a worker count of zero");
    } else {
      self.worker_threads = Some(threads);
    }
  }
}

/// A non-empty environment variable.
fn env(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
