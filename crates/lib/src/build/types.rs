use std::fmt;

use thiserror::Error;

use crate::config::ConfigurationKey;
use crate::engine::{EngineBuildResult, EngineError, ProjectInstance};

use super::host::HostError;

#[derive(Debug, Error)]
pub enum BuildError {
  /// Another build, or another project, holds the build manager.
  #[error("a build is already in progress")]
  BuildInProgress,

  #[error("cannot switch to configuration {requested} while a build for {active} is in progress")]
  ConfigurationMismatch {
    active: ConfigurationKey,
    requested: ConfigurationKey,
  },

  #[error("build manager refused the request: {0}")]
  Host(#[from] HostError),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
  /// Block the caller until the engine finishes.
  Sync,
  /// Return immediately; completion arrives on the UI context.
  Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
  Successful,
  Failed,
  /// The request was deferred because evaluation is suspended.
  Suspended,
}

impl fmt::Display for BuildOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildOutcome::Successful => write!(f, "succeeded"),
      BuildOutcome::Failed => write!(f, "failed"),
      BuildOutcome::Suspended => write!(f, "suspended"),
    }
  }
}

/// Outcome of a build plus the instance it produced.
///
/// A successful result always carries the produced instance.
#[derive(Debug, Clone)]
pub struct BuildResult {
  outcome: BuildOutcome,
  produced: Option<ProjectInstance>,
}

impl BuildResult {
  pub fn successful(produced: ProjectInstance) -> Self {
    Self {
      outcome: BuildOutcome::Successful,
      produced: Some(produced),
    }
  }

  pub fn failed(produced: Option<ProjectInstance>) -> Self {
    Self {
      outcome: BuildOutcome::Failed,
      produced,
    }
  }

  pub fn suspended() -> Self {
    Self {
      outcome: BuildOutcome::Suspended,
      produced: None,
    }
  }

  pub fn outcome(&self) -> BuildOutcome {
    self.outcome
  }

  pub fn is_successful(&self) -> bool {
    self.outcome == BuildOutcome::Successful
  }

  pub fn produced(&self) -> Option<&ProjectInstance> {
    self.produced.as_ref()
  }

  pub fn into_produced(self) -> Option<ProjectInstance> {
    self.produced
  }
}

impl From<EngineBuildResult> for BuildResult {
  fn from(result: EngineBuildResult) -> Self {
    if result.is_success() {
      Self::successful(result.instance)
    } else {
      Self::failed(Some(result.instance))
    }
  }
}

/// Invoked on the UI context once a build has finished and the build manager is released.
pub type BuildCompletion = Box<dyn FnOnce(&BuildResult)>;

/// One build invocation.
pub struct BuildRequest {
  pub target: Option<String>,
  pub configuration: ConfigurationKey,
  pub mode: BuildMode,
  /// Design-time builds take a design-time token from the host build manager.
  pub design_time: bool,
  pub completion: Option<BuildCompletion>,
}

impl fmt::Debug for BuildRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildRequest")
      .field("target", &self.target)
      .field("configuration", &self.configuration)
      .field("mode", &self.mode)
      .field("design_time", &self.design_time)
      .field("completion", &self.completion.is_some())
      .finish()
  }
}

impl BuildRequest {
  pub fn new(configuration: ConfigurationKey, target: Option<&str>, mode: BuildMode) -> Self {
    Self {
      target: target.map(str::to_string),
      configuration,
      mode,
      design_time: false,
      completion: None,
    }
  }

  pub fn design_time(mut self) -> Self {
    self.design_time = true;
    self
  }

  pub fn on_complete(mut self, completion: impl FnOnce(&BuildResult) + 'static) -> Self {
    self.completion = Some(Box::new(completion));
    self
  }

  /// Requested targets; `target` may list several separated by `;`.
  pub fn targets(&self) -> Vec<String> {
    self
      .target
      .iter()
      .flat_map(|t| t.split(';'))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(str::to_string)
      .collect()
  }
}

/// What [`BuildCoordinator::submit`](super::BuildCoordinator::submit) did with a request.
#[derive(Debug)]
pub enum Submitted {
  /// A synchronous build ran to completion.
  Completed(BuildResult),
  /// An asynchronous build was dispatched; its completion will be posted to the UI context.
  Pending,
}
