//! Build coordination: mutual exclusion, build manager negotiation and
//! submission of synchronous and asynchronous builds.
//!
//! All coordinator state lives on the UI context. Asynchronous builds run on
//! the engine's worker pool and come back through a [`Continuation`], so
//! [`BuildCoordinator::end_build`] and the caller's completion always run on
//! the UI thread, in that order.
//!
//! [`Continuation`]: crate::ui::Continuation

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ConfigurationKey;
use crate::consts::MANDATORY_BUILD_PROPERTIES;
use crate::engine::{BuildEngine, EngineBuildResult, EngineLogger, NodeAffinity, ProjectInstance, Submission, SubmissionId};
use crate::ui::UiContext;

use super::host::HostBuildManager;
use super::types::{BuildCompletion, BuildError, BuildMode, BuildRequest, BuildResult, Submitted};

struct Inner {
  engine: BuildEngine,
  host: Option<Arc<dyn HostBuildManager>>,
  ui: Rc<UiContext>,
  build_in_progress: Cell<bool>,
  building: RefCell<Option<ConfigurationKey>>,
  suspend_count: Cell<u32>,
  deferred: RefCell<Option<DeferredBuild>>,
}

/// The last build request made while evaluation was suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredBuild {
  pub key: ConfigurationKey,
  pub target: String,
}

/// Owns the build-in-progress flag and the suspend counter of one project.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BuildCoordinator {
  inner: Rc<Inner>,
}

impl BuildCoordinator {
  /// `host` is `None` when the process is not embedded in a host; builds then
  /// fall back to an engine build session without UI negotiation.
  pub fn new(engine: BuildEngine, host: Option<Arc<dyn HostBuildManager>>, ui: Rc<UiContext>) -> Self {
    Self {
      inner: Rc::new(Inner {
        engine,
        host,
        ui,
        build_in_progress: Cell::new(false),
        building: RefCell::new(None),
        suspend_count: Cell::new(0),
        deferred: RefCell::new(None),
      }),
    }
  }

  pub fn engine(&self) -> &BuildEngine {
    &self.inner.engine
  }

  pub fn ui(&self) -> &Rc<UiContext> {
    &self.inner.ui
  }

  pub fn build_in_progress(&self) -> bool {
    self.inner.build_in_progress.get()
  }

  /// Configuration of the build currently holding the coordinator.
  pub fn building_configuration(&self) -> Option<ConfigurationKey> {
    self.inner.building.borrow().clone()
  }

  /// Try to take the build manager. Never blocks.
  ///
  /// Acquires the UI claim, then the design-time token (or the user-build mark
  /// for non-design-time builds), then the in-progress flag. Either everything is acquired or nothing is held on return.
  pub fn try_begin_build(&self, design_time: bool, requires_ui: bool) -> bool {
    if self.inner.build_in_progress.get() {
      debug!("build already in progress");
      return false;
    }

    match &self.inner.host {
      Some(host) => {
        if requires_ui && let Err(e) = host.claim_ui_thread_for_build() {
          debug!(error = %e, "could not claim UI thread for build");
          return false;
        }
        let started = if design_time {
          host.begin_design_time_build()
        } else {
          host.begin_user_build()
        };
        if let Err(e) = started {
          debug!(error = %e, design_time, "host refused the build");
          if requires_ui && let Err(e) = host.release_ui_thread_for_build() {
            warn!(error = %e, "failed to release UI thread after host refusal");
          }
          return false;
        }
      }
      None => {
        if let Err(e) = self.inner.engine.begin_build_session() {
          debug!(error = %e, "could not open build session");
          return false;
        }
      }
    }

    self.inner.build_in_progress.set(true);
    true
  }

  /// Release everything [`try_begin_build`](Self::try_begin_build) took.
  ///
  /// Each release is attempted even if an earlier one fails. The in-progress
  /// flag is cleared last, unconditionally.
  pub fn end_build(&self, submission: Option<SubmissionId>, design_time: bool, requires_ui: bool) {
    match &self.inner.host {
      Some(host) => {
        if let Some(id) = submission
          && let Err(e) = host.unregister_loggers(id)
        {
          warn!(submission = %id, error = %e, "failed to unregister loggers");
        }
        let ended = if design_time {
          host.end_design_time_build()
        } else {
          host.end_user_build()
        };
        if let Err(e) = ended {
          warn!(error = %e, design_time, "failed to end build in host");
        }
        if requires_ui && let Err(e) = host.release_ui_thread_for_build() {
          warn!(error = %e, "failed to release UI thread");
        }
      }
      None => {
        if let Some(id) = submission {
          self.inner.engine.detach_loggers(id);
        }
        self.inner.engine.end_build_session();
      }
    }

    self.inner.building.replace(None);
    self.inner.build_in_progress.set(false);
  }

  /// Submit `snapshot` for the request's target.
  ///
  /// Synchronous requests block until the engine finishes. Asynchronous
  /// requests return [`Submitted::Pending`]; the completion runs on the UI
  /// context after the build manager is released. If the build cannot be
  /// started, the completion still runs, with a failed result, before the
  /// error is returned.
  pub fn submit(
    &self,
    request: BuildRequest,
    snapshot: ProjectInstance,
    logger: Option<Arc<dyn EngineLogger>>,
  ) -> Result<Submitted, BuildError> {
    let design_time = request.design_time;
    let requires_ui = request.mode == BuildMode::Sync && self.inner.ui.is_ui_thread();
    let targets = request.targets();
    let completion = Rc::new(RefCell::new(request.completion));
    let fail = |completion: &Rc<RefCell<Option<BuildCompletion>>>| {
      if let Some(callback) = completion.borrow_mut().take() {
        callback(&BuildResult::failed(None));
      }
    };

    if !self.try_begin_build(design_time, requires_ui) {
      fail(&completion);
      return Err(BuildError::BuildInProgress);
    }
    self.inner.building.replace(Some(request.configuration.clone()));
    info!(
      configuration = %request.configuration,
      target = request.target.as_deref().unwrap_or("<default>"),
      mode = ?request.mode,
      design_time,
      snapshot = %snapshot.fingerprint(),
      "submitting build"
    );

    let submission = match self.pend(snapshot, &targets, logger) {
      Ok(submission) => submission,
      Err(e) => {
        self.end_build(None, design_time, requires_ui);
        fail(&completion);
        return Err(e);
      }
    };
    let id = submission.id();

    match request.mode {
      BuildMode::Sync => match submission.execute() {
        Ok(engine_result) => {
          let result = BuildResult::from(engine_result);
          self.end_build(Some(id), design_time, requires_ui);
          if let Some(callback) = completion.borrow_mut().take() {
            callback(&result);
          }
          Ok(Submitted::Completed(result))
        }
        Err(e) => {
          self.end_build(Some(id), design_time, requires_ui);
          fail(&completion);
          Err(e.into())
        }
      },
      BuildMode::Async => {
        let this = self.clone();
        let on_ui = completion.clone();
        let continuation = self.inner.ui.continuation(move |engine_result: EngineBuildResult| {
          let result = BuildResult::from(engine_result);
          debug!(submission = %id, outcome = %result.outcome(), "async build completed");
          this.end_build(Some(id), design_time, requires_ui);
          if let Some(callback) = on_ui.borrow_mut().take() {
            callback(&result);
          }
        });

        match submission.execute_async(move |engine_result| {
          continuation.post(engine_result);
        }) {
          Ok(()) => Ok(Submitted::Pending),
          Err(e) => {
            self.end_build(Some(id), design_time, requires_ui);
            fail(&completion);
            Err(e.into())
          }
        }
      }
    }
  }

  fn pend(
    &self,
    mut snapshot: ProjectInstance,
    targets: &[String],
    logger: Option<Arc<dyn EngineLogger>>,
  ) -> Result<Submission, BuildError> {
    for (name, value) in MANDATORY_BUILD_PROPERTIES {
      snapshot.set_global_property(name, value);
    }
    snapshot.set_node_affinity(NodeAffinity::InProc);

    let submission = self.inner.engine.pend_build(snapshot, targets)?;
    if let Some(logger) = logger {
      match &self.inner.host {
        Some(host) => host.register_logger(submission.id(), logger)?,
        None => self.inner.engine.attach_logger(submission.id(), logger),
      }
    }
    Ok(submission)
  }

  /// Enter a scope in which build requests are deferred.
  pub fn suspend_msbuild(&self) {
    let count = self.inner.suspend_count.get() + 1;
    self.inner.suspend_count.set(count);
    debug!(count, "evaluation suspended");
  }

  /// Leave a suspend scope.
  ///
  /// Returns the remembered request when this was the outermost scope and a
  /// build was deferred while suspended. It is taken out so the caller issues
  /// exactly one replay.
  pub fn resume_msbuild(&self) -> Option<DeferredBuild> {
    let count = self.inner.suspend_count.get();
    if count == 0 {
      warn!("resume without matching suspend");
      return None;
    }
    self.inner.suspend_count.set(count - 1);
    debug!(count = count - 1, "evaluation resumed");
    if count == 1 { self.inner.deferred.take() } else { None }
  }

  /// Remember a build request made while suspended, replacing any earlier one.
  /// Returns whether it was deferred.
  pub fn defer_if_suspended(&self, key: &ConfigurationKey, target: &str) -> bool {
    if self.inner.suspend_count.get() == 0 {
      return false;
    }
    self.inner.deferred.replace(Some(DeferredBuild {
      key: key.clone(),
      target: target.to_string(),
    }));
    true
  }

  pub fn is_suspended(&self) -> bool {
    self.inner.suspend_count.get() > 0
  }
}
