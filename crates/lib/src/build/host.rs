//! Host build manager.
//!
//! The host process owns one build manager shared by every project. Projects
//! negotiate for it through [`HostBuildManager`]: claiming the UI thread for a
//! build, taking design-time build tokens and routing loggers. Every request
//! either succeeds immediately or fails; nothing blocks.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::engine::{BuildEngine, EngineLogger, SubmissionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
  #[error("the UI thread is already claimed for a build")]
  UiThreadBusy,

  #[error("the UI thread was not claimed")]
  UiThreadNotClaimed,

  #[error("a user build is running; design-time builds are refused")]
  UserBuildActive,

  #[error("no design-time build is open")]
  NoDesignTimeBuild,

  #[error("no user build is running")]
  NoUserBuild,

  #[error("logger registration failed: {0}")]
  Logger(String),
}

/// Access to the host's shared build manager.
pub trait HostBuildManager: Send + Sync {
  fn claim_ui_thread_for_build(&self) -> Result<(), HostError>;
  fn release_ui_thread_for_build(&self) -> Result<(), HostError>;
  fn begin_design_time_build(&self) -> Result<(), HostError>;
  fn end_design_time_build(&self) -> Result<(), HostError>;
  /// Mark a user-initiated build as running; design-time builds are refused until it ends.
  fn begin_user_build(&self) -> Result<(), HostError>;
  fn end_user_build(&self) -> Result<(), HostError>;
  fn register_logger(&self, submission: SubmissionId, logger: Arc<dyn EngineLogger>) -> Result<(), HostError>;
  fn unregister_loggers(&self, submission: SubmissionId) -> Result<(), HostError>;
}

#[derive(Debug, Default)]
struct HostState {
  ui_claimed: bool,
  design_time_builds: usize,
  user_builds: usize,
}

/// In-process host build manager, shared by every project through an `Arc`.
#[derive(Debug)]
pub struct SharedHostBuildManager {
  engine: BuildEngine,
  state: Mutex<HostState>,
}

impl SharedHostBuildManager {
  pub fn new(engine: BuildEngine) -> Arc<Self> {
    Arc::new(Self {
      engine,
      state: Mutex::new(HostState::default()),
    })
  }

  fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn is_ui_thread_claimed(&self) -> bool {
    self.state().ui_claimed
  }

  pub fn design_time_builds(&self) -> usize {
    self.state().design_time_builds
  }

  pub fn user_builds(&self) -> usize {
    self.state().user_builds
  }
}

impl HostBuildManager for SharedHostBuildManager {
  fn claim_ui_thread_for_build(&self) -> Result<(), HostError> {
    let mut state = self.state();
    if state.ui_claimed {
      return Err(HostError::UiThreadBusy);
    }
    state.ui_claimed = true;
    debug!("UI thread claimed for build");
    Ok(())
  }

  fn release_ui_thread_for_build(&self) -> Result<(), HostError> {
    let mut state = self.state();
    if !state.ui_claimed {
      return Err(HostError::UiThreadNotClaimed);
    }
    state.ui_claimed = false;
    debug!("UI thread released");
    Ok(())
  }

  fn begin_design_time_build(&self) -> Result<(), HostError> {
    let mut state = self.state();
    if state.user_builds > 0 {
      return Err(HostError::UserBuildActive);
    }
    state.design_time_builds += 1;
    Ok(())
  }

  fn end_design_time_build(&self) -> Result<(), HostError> {
    let mut state = self.state();
    match state.design_time_builds.checked_sub(1) {
      Some(remaining) => {
        state.design_time_builds = remaining;
        Ok(())
      }
      None => Err(HostError::NoDesignTimeBuild),
    }
  }

  fn begin_user_build(&self) -> Result<(), HostError> {
    let mut state = self.state();
    state.user_builds += 1;
    debug!(running = state.user_builds, "user build started");
    Ok(())
  }

  fn end_user_build(&self) -> Result<(), HostError> {
    let mut state = self.state();
    match state.user_builds.checked_sub(1) {
      Some(remaining) => {
        state.user_builds = remaining;
        debug!(running = remaining, "user build ended");
        Ok(())
      }
      None => Err(HostError::NoUserBuild),
    }
  }

  fn register_logger(&self, submission: SubmissionId, logger: Arc<dyn EngineLogger>) -> Result<(), HostError> {
    if self.engine.is_shut_down() {
      return Err(HostError::Logger("build engine is shut down".to_string()));
    }
    self.engine.attach_logger(submission, logger);
    Ok(())
  }

  fn unregister_loggers(&self, submission: SubmissionId) -> Result<(), HostError> {
    let removed = self.engine.detach_loggers(submission);
    debug!(%submission, removed, "loggers unregistered");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::EngineOptions;

  fn manager() -> Arc<SharedHostBuildManager> {
    SharedHostBuildManager::new(
      BuildEngine::new(EngineOptions {
        worker_threads: Some(1),
        shell: None,
      })
      .unwrap(),
    )
  }

  #[test]
  fn ui_claim_is_exclusive() {
    let host = manager();
    host.claim_ui_thread_for_build().unwrap();
    assert_eq!(host.claim_ui_thread_for_build(), Err(HostError::UiThreadBusy));
    host.release_ui_thread_for_build().unwrap();
    host.claim_ui_thread_for_build().unwrap();
  }

  #[test]
  fn releasing_unclaimed_ui_thread_fails() {
    let host = manager();
    assert_eq!(host.release_ui_thread_for_build(), Err(HostError::UiThreadNotClaimed));
  }

  #[test]
  fn user_build_blocks_design_time_builds() {
    let host = manager();
    host.begin_user_build().unwrap();
    host.begin_user_build().unwrap();
    assert_eq!(host.begin_design_time_build(), Err(HostError::UserBuildActive));
    host.end_user_build().unwrap();
    assert_eq!(host.begin_design_time_build(), Err(HostError::UserBuildActive));
    host.end_user_build().unwrap();
    assert_eq!(host.end_user_build(), Err(HostError::NoUserBuild));
    host.begin_design_time_build().unwrap();
    host.begin_design_time_build().unwrap();
    assert_eq!(host.design_time_builds(), 2);
    host.end_design_time_build().unwrap();
    host.end_design_time_build().unwrap();
    assert_eq!(host.end_design_time_build(), Err(HostError::NoDesignTimeBuild));
  }
}
