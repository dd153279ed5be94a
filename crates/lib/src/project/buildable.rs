//! The buildable view of one configuration, as seen by a solution build.
//!
//! Status callbacks are advisory. Each is told when a build begins and ends;
//! a callback that fails or panics is logged and skipped, never allowed to
//! abort the build.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::build::BuildResult;
use crate::config::ConfigurationKey;
use crate::consts::{BUILD_TARGET, CLEAN_TARGET, REBUILD_TARGET};

use super::ProjectError;
use super::node::ProjectNode;

pub type CallbackResult<T> = Result<T, Box<dyn std::error::Error>>;

pub trait BuildStatusCallback {
  /// Return `Ok(false)` to ask that the build not start.
  fn build_begin(&self) -> CallbackResult<bool>;

  fn build_end(&self, success: bool) -> CallbackResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
  /// Build the `Rebuild` target instead of the default targets.
  pub rebuild: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdviseCookie(pub u32);

type Subscribers = Vec<(AdviseCookie, Rc<dyn BuildStatusCallback>)>;

pub struct BuildableConfiguration {
  node: Rc<ProjectNode>,
  key: ConfigurationKey,
  callbacks: RefCell<Subscribers>,
  next_cookie: Cell<u32>,
}

impl fmt::Debug for BuildableConfiguration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildableConfiguration")
      .field("key", &self.key)
      .field("callbacks", &self.callbacks.borrow().len())
      .finish()
  }
}

impl BuildableConfiguration {
  pub fn new(node: Rc<ProjectNode>, key: ConfigurationKey) -> Self {
    Self {
      node,
      key,
      callbacks: RefCell::new(Vec::new()),
      next_cookie: Cell::new(1),
    }
  }

  pub fn key(&self) -> &ConfigurationKey {
    &self.key
  }

  pub fn advise_build_status_callback(&self, callback: Rc<dyn BuildStatusCallback>) -> AdviseCookie {
    let cookie = AdviseCookie(self.next_cookie.get());
    self.next_cookie.set(cookie.0 + 1);
    self.callbacks.borrow_mut().push((cookie, callback));
    cookie
  }

  /// Returns false when `cookie` was not registered.
  pub fn unadvise_build_status_callback(&self, cookie: AdviseCookie) -> bool {
    let mut callbacks = self.callbacks.borrow_mut();
    let before = callbacks.len();
    callbacks.retain(|(c, _)| *c != cookie);
    callbacks.len() != before
  }

  /// Whether a build may start now.
  pub fn query_start_build(&self, _options: BuildOptions) -> bool {
    !self.node.build_in_progress()
  }

  pub fn query_start_clean(&self, _options: BuildOptions) -> bool {
    !self.node.build_in_progress()
  }

  /// Up-to-date checks are not supported.
  pub fn query_start_up_to_date_check(&self, _options: BuildOptions) -> bool {
    false
  }

  /// True when no build is running.
  pub fn query_status(&self) -> bool {
    !self.node.build_in_progress()
  }

  pub fn start_build(&self, options: BuildOptions) -> Result<(), ProjectError> {
    self.node.prepare_build(&self.key, false)?;
    let target = options.rebuild.then_some(REBUILD_TARGET);
    self.dispatch(target)
  }

  pub fn start_clean(&self, _options: BuildOptions) -> Result<(), ProjectError> {
    self.node.prepare_build(&self.key, true)?;
    self.dispatch(Some(CLEAN_TARGET))
  }

  pub fn start_up_to_date_check(&self, _options: BuildOptions) -> Result<(), ProjectError> {
    Err(ProjectError::NotImplemented("up-to-date check"))
  }

  /// In-flight builds always run to completion.
  pub fn stop(&self, _sync: bool) -> Result<(), ProjectError> {
    Ok(())
  }

  pub fn wait(&self, _milliseconds: u32, _tick: bool) -> Result<(), ProjectError> {
    Err(ProjectError::NotImplemented("wait"))
  }

  fn dispatch(&self, target: Option<&str>) -> Result<(), ProjectError> {
    let subscribers: Vec<Rc<dyn BuildStatusCallback>> =
      self.callbacks.borrow().iter().map(|(_, cb)| cb.clone()).collect();

    let mut proceed = true;
    for callback in &subscribers {
      if guarded("build_begin", || callback.build_begin()) == Some(false) {
        proceed = false;
      }
    }
    if !proceed {
      info!(configuration = %self.key, "build cancelled by a status callback");
      return Ok(());
    }

    let notifier = Rc::new(BuildEndNotifier {
      subscribers,
      node: self.node.clone(),
      target: target.map(str::to_string),
      sent: Cell::new(false),
    });
    let on_complete = {
      let notifier = notifier.clone();
      move |result: &BuildResult| notifier.notify(result.is_successful())
    };
    match self.node.build_async(&self.key, target, on_complete) {
      Ok(()) => Ok(()),
      Err(e) => {
        notifier.notify(false);
        Err(e)
      }
    }
  }
}

/// Sends `build_end` to every subscriber of one build, once.
struct BuildEndNotifier {
  subscribers: Vec<Rc<dyn BuildStatusCallback>>,
  node: Rc<ProjectNode>,
  target: Option<String>,
  sent: Cell<bool>,
}

impl BuildEndNotifier {
  fn notify(&self, success: bool) {
    if self.sent.replace(true) {
      return;
    }
    for callback in &self.subscribers {
      guarded("build_end", || callback.build_end(success));
    }

    let refreshes = match self.target.as_deref() {
      None => true,
      Some(target) => target == BUILD_TARGET || target == REBUILD_TARGET,
    };
    if success && refreshes {
      self.node.refresh_references();
    }
    debug!(success, target = self.target.as_deref().unwrap_or("<default>"), "build end delivered");
  }
}

fn guarded<T>(what: &'static str, f: impl FnOnce() -> CallbackResult<T>) -> Option<T> {
  match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(value)) => Some(value),
    Ok(Err(e)) => {
      warn!(callback = what, error = %e, "build status callback failed");
      None
    }
    Err(_) => {
      warn!(callback = what, "build status callback panicked");
      None
    }
  }
}
