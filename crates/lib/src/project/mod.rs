//! The project node and everything hanging off it: configurations, the
//! buildable adapter, launch settings, items and their mutations.

mod buildable;
mod commands;
mod configuration;
mod documents;
mod hierarchy;
mod items;
mod launch;
mod node;
mod references;
mod rename;

use std::path::PathBuf;

use thiserror::Error;

use crate::build::BuildError;
use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::output::OutputError;
use crate::property::PropertyError;

pub use buildable::{AdviseCookie, BuildOptions, BuildStatusCallback, BuildableConfiguration, CallbackResult};
pub use commands::{Command, CommandDispatcher, CommandGroup, CommandResult, CommandStatus, project_commands};
pub use configuration::ProjectConfiguration;
pub use documents::{DocumentError, DocumentTracker, NoDocuments};
pub use hierarchy::{Hierarchy, ItemId, ItemNode, Slot, paths_equal_ignore_case};
pub use launch::{
  DebugEngine, LaunchError, LaunchFlags, LaunchInfo, LaunchSource, StartAction, derive_launch_info,
  escape_shell_metacharacters,
};
pub use node::{ProjectNode, ProjectServices};
pub use references::{AssemblyReference, HINT_PATH_METADATA, ProjectReferences, ReferenceContainer, ReferenceHandle, refresh_all};
pub use rename::{RenameError, RenameOutcome, RenameStage};

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("{}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("no item at {}", .0.display())]
  ItemNotFound(PathBuf),

  #[error("{} is already part of the project", .0.display())]
  ItemExists(PathBuf),

  #[error("{0} is not supported")]
  NotImplemented(&'static str),

  #[error("the project has been closed")]
  Closed,

  #[error(transparent)]
  Property(#[from] PropertyError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Output(#[from] OutputError),

  #[error(transparent)]
  Launch(#[from] LaunchError),

  #[error(transparent)]
  Rename(#[from] RenameError),

  #[error(transparent)]
  Engine(#[from] EngineError),
}
