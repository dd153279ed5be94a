//! Test utilities for projsys-lib.
//!
//! Cross-platform `exec` command lines, a throwaway project loaded into a
//! [`ProjectNode`], and a build status callback that records what it saw.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use tempfile::TempDir;

use crate::build::MemorySink;
use crate::engine::{BuildEngine, EngineOptions};
use crate::project::{BuildStatusCallback, CallbackResult, ProjectNode, ProjectServices};
use crate::ui::UiContext;

/// Command line for an `exec` task that prints `msg`.
#[cfg(unix)]
pub fn echo_msg(msg: &str) -> String {
  format!("echo '{msg}'")
}

#[cfg(windows)]
pub fn echo_msg(msg: &str) -> String {
  format!("echo {msg}")
}

/// Command line for an `exec` task that exits with `code`.
#[cfg(unix)]
pub fn exit_with(code: i32) -> String {
  format!("exit {code}")
}

#[cfg(windows)]
pub fn exit_with(code: i32) -> String {
  format!("exit /b {code}")
}

pub fn engine() -> BuildEngine {
  BuildEngine::new(EngineOptions {
    worker_threads: Some(2),
    shell: None,
  })
  .unwrap()
}

/// A project written to a temporary directory and loaded with default services.
pub struct TestProject {
  pub temp: TempDir,
  pub ui: Rc<UiContext>,
  pub output: Arc<MemorySink>,
  pub node: Rc<ProjectNode>,
}

impl TestProject {
  pub fn new(content: &str) -> Self {
    Self::with(content, |_| {})
  }

  /// Like [`TestProject::new`], letting `configure` adjust the services first.
  pub fn with(content: &str, configure: impl FnOnce(&mut ProjectServices)) -> Self {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.projsys.json");
    std::fs::write(&path, content).unwrap();

    let ui = Rc::new(UiContext::new());
    let output = Arc::new(MemorySink::new());
    let mut services = ProjectServices::new(engine(), ui.clone());
    services.output = output.clone();
    configure(&mut services);
    let node = ProjectNode::load(&path, services).unwrap();
    Self { temp, ui, output, node }
  }

  pub fn dir(&self) -> PathBuf {
    self.node.project_dir()
  }

  /// Create `name` under the project directory.
  pub fn write(&self, name: &str, content: &str) -> PathBuf {
    let path = self.dir().join(name);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn path(&self, name: &str) -> PathBuf {
    self.dir().join(Path::new(name))
  }
}

pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
  Rc::new(RefCell::new(Vec::new()))
}

/// Appends `name:begin` and `name:end:<success>` to a shared log.
pub struct Recorder {
  name: &'static str,
  proceed: bool,
  log: EventLog,
}

impl Recorder {
  pub fn new(name: &'static str, proceed: bool, log: &EventLog) -> Rc<dyn BuildStatusCallback> {
    Rc::new(Self {
      name,
      proceed,
      log: log.clone(),
    })
  }
}

impl BuildStatusCallback for Recorder {
  fn build_begin(&self) -> CallbackResult<bool> {
    self.log.borrow_mut().push(format!("{}:begin", self.name));
    Ok(self.proceed)
  }

  fn build_end(&self, success: bool) -> CallbackResult<()> {
    self.log.borrow_mut().push(format!("{}:end:{success}", self.name));
    Ok(())
  }
}
