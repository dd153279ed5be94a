//! Engine error, event and result types.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::instance::ProjectInstance;
use super::project::Importance;

/// Errors raised by the engine itself, as opposed to failed builds.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("failed to read project {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse project {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize project: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write project {}: {source}", .path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to start build worker pool: {0}")]
  Runtime(#[source] std::io::Error),

  #[error("a build session is already open")]
  SessionActive,

  #[error("the build engine has been shut down")]
  ShutDown,

  #[error("build {0} panicked")]
  Panicked(SubmissionId),
}

/// Identifies one pending or running submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// A diagnostic with an optional source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub code: Option<String>,
  pub file: Option<String>,
  pub line: Option<u32>,
  pub column: Option<u32>,
  pub text: String,
}

impl Diagnostic {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      code: None,
      file: None,
      line: None,
      column: None,
      text: text.into(),
    }
  }

  pub fn with_code(mut self, code: Option<String>) -> Self {
    self.code = code;
    self
  }

  pub fn with_file(mut self, file: Option<String>) -> Self {
    self.file = file;
    self
  }
}

/// Events reported to loggers while a submission runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
  BuildStarted { submission: SubmissionId, project: PathBuf },
  TargetStarted { name: String },
  TargetSkipped { name: String },
  TargetFinished { name: String, success: bool },
  Message { importance: Importance, text: String },
  Warning(Diagnostic),
  Error(Diagnostic),
  BuildFinished { submission: SubmissionId, success: bool },
}

/// Receives build events; called from engine worker threads.
pub trait EngineLogger: Send + Sync {
  fn on_event(&self, event: &BuildEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallResult {
  Success,
  Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
  Success,
  Failure,
  Skipped,
}

/// What a submission produced.
#[derive(Debug, Clone)]
pub struct EngineBuildResult {
  pub submission: SubmissionId,
  pub overall: OverallResult,
  pub targets: BTreeMap<String, TargetOutcome>,
  /// The instance after the build ran, including items added by tasks.
  pub instance: ProjectInstance,
}

impl EngineBuildResult {
  pub fn is_success(&self) -> bool {
    self.overall == OverallResult::Success
  }
}
