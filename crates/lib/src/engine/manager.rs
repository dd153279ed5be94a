//! The build engine handle: worker pool, sessions and logger registry.
//!
//! A [`BuildEngine`] is constructed explicitly, passed to whoever needs to
//! build, and shut down explicitly. Clones share the same worker pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn};

use super::instance::{NodeAffinity, ProjectInstance};
use super::submission::Submission;
use super::types::{EngineError, EngineLogger, SubmissionId};

/// How long [`BuildEngine::shutdown`] waits for running submissions.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Construction options for a [`BuildEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
  /// Worker pool size; `None` uses the available parallelism.
  pub worker_threads: Option<usize>,
  /// Shell used by `exec` tasks; `None` picks the platform default.
  pub shell: Option<String>,
}

/// Loggers attached to submissions, keyed by submission id.
#[derive(Default)]
pub struct LoggerRegistry {
  loggers: Mutex<HashMap<SubmissionId, Vec<Arc<dyn EngineLogger>>>>,
}

impl LoggerRegistry {
  pub fn attach(&self, submission: SubmissionId, logger: Arc<dyn EngineLogger>) {
    let mut loggers = self.loggers.lock().unwrap_or_else(|e| e.into_inner());
    loggers.entry(submission).or_default().push(logger);
  }

  /// Remove every logger for `submission`. Returns how many were removed.
  pub fn detach(&self, submission: SubmissionId) -> usize {
    let mut loggers = self.loggers.lock().unwrap_or_else(|e| e.into_inner());
    loggers.remove(&submission).map(|l| l.len()).unwrap_or(0)
  }

  pub fn loggers_for(&self, submission: SubmissionId) -> Vec<Arc<dyn EngineLogger>> {
    let loggers = self.loggers.lock().unwrap_or_else(|e| e.into_inner());
    loggers.get(&submission).cloned().unwrap_or_default()
  }
}

pub(super) struct EngineInner {
  runtime: Mutex<Option<Runtime>>,
  loggers: LoggerRegistry,
  next_submission: AtomicU64,
  session_open: AtomicBool,
  shell: Option<String>,
}

impl EngineInner {
  pub(super) fn handle(&self) -> Result<Handle, EngineError> {
    let runtime = self.runtime.lock().unwrap_or_else(|e| e.into_inner());
    runtime.as_ref().map(|rt| rt.handle().clone()).ok_or(EngineError::ShutDown)
  }

  pub(super) fn loggers(&self) -> &LoggerRegistry {
    &self.loggers
  }

  pub(super) fn shell(&self) -> Option<&str> {
    self.shell.as_deref()
  }
}

impl Drop for EngineInner {
  fn drop(&mut self) {
    let runtime = self.runtime.get_mut().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(runtime) = runtime {
      runtime.shutdown_background();
    }
  }
}

/// Handle to the in-process build engine.
#[derive(Clone)]
pub struct BuildEngine {
  inner: Arc<EngineInner>,
}

impl std::fmt::Debug for BuildEngine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BuildEngine")
      .field("running", &!self.is_shut_down())
      .field("session_open", &self.inner.session_open.load(Ordering::SeqCst))
      .finish()
  }
}

impl BuildEngine {
  /// Start the worker pool.
  pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name("projsys-build");
    if let Some(threads) = options.worker_threads {
      builder.worker_threads(threads.max(1));
    }
    let runtime = builder.build().map_err(EngineError::Runtime)?;
    info!(workers = ?options.worker_threads, "build engine started");

    Ok(Self {
      inner: Arc::new(EngineInner {
        runtime: Mutex::new(Some(runtime)),
        loggers: LoggerRegistry::default(),
        next_submission: AtomicU64::new(1),
        session_open: AtomicBool::new(false),
        shell: options.shell,
      }),
    })
  }

  /// Queue a build of `instance` for `targets`.
  ///
  /// Submissions always run in-process; the instance's node affinity is
  /// pinned before it is handed to the worker pool.
  pub fn pend_build(&self, mut instance: ProjectInstance, targets: &[String]) -> Result<Submission, EngineError> {
    if self.is_shut_down() {
      return Err(EngineError::ShutDown);
    }
    if instance.node_affinity() != NodeAffinity::InProc {
      instance.set_node_affinity(NodeAffinity::InProc);
    }
    let id = SubmissionId(self.inner.next_submission.fetch_add(1, Ordering::SeqCst));
    debug!(submission = %id, targets = ?targets, "pending build");
    Ok(Submission::new(id, instance, targets.to_vec(), self.inner.clone()))
  }

  pub fn attach_logger(&self, submission: SubmissionId, logger: Arc<dyn EngineLogger>) {
    self.inner.loggers.attach(submission, logger);
  }

  pub fn detach_loggers(&self, submission: SubmissionId) -> usize {
    self.inner.loggers.detach(submission)
  }

  /// Open the engine-level build session used when no host build manager exists.
  pub fn begin_build_session(&self) -> Result<(), EngineError> {
    if self.is_shut_down() {
      return Err(EngineError::ShutDown);
    }
    self
      .inner
      .session_open
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .map(|_| debug!("build session opened"))
      .map_err(|_| EngineError::SessionActive)
  }

  pub fn end_build_session(&self) {
    if self.inner.session_open.swap(false, Ordering::SeqCst) {
      debug!("build session closed");
    }
  }

  pub fn is_session_open(&self) -> bool {
    self.inner.session_open.load(Ordering::SeqCst)
  }

  pub fn is_shut_down(&self) -> bool {
    let runtime = self.inner.runtime.lock().unwrap_or_else(|e| e.into_inner());
    runtime.is_none()
  }

  /// Stop the worker pool, waiting briefly for running submissions.
  ///
  /// Must not be called from inside a completion callback.
  pub fn shutdown(&self) {
    let runtime = self.inner.runtime.lock().unwrap_or_else(|e| e.into_inner()).take();
    match runtime {
      Some(runtime) => {
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        info!("build engine shut down");
      }
      None => warn!("build engine already shut down"),
    }
  }
}
