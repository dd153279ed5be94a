//! Shared helpers for projsys-lib integration tests.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use projsys_lib::build::MemorySink;
use projsys_lib::config::ConfigurationKey;
use projsys_lib::engine::{BuildEngine, EngineOptions};
use projsys_lib::project::{ProjectNode, ProjectServices};
use projsys_lib::ui::UiContext;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

pub fn debug() -> ConfigurationKey {
  ConfigurationKey::new("Debug", "Any CPU")
}

pub fn release() -> ConfigurationKey {
  ConfigurationKey::new("Release", "Any CPU")
}

/// A fixture project copied into its own temporary directory.
pub struct TestEnv {
  pub temp: TempDir,
  pub ui: Rc<UiContext>,
  pub output: Arc<MemorySink>,
  pub node: Rc<ProjectNode>,
}

impl TestEnv {
  pub fn from_fixture(name: &str) -> Self {
    Self::from_fixture_with(name, |_| {})
  }

  /// Like [`TestEnv::from_fixture`], letting `configure` adjust the services first.
  pub fn from_fixture_with(name: &str, configure: impl FnOnce(&mut ProjectServices)) -> Self {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(name);
    std::fs::write(&path, fixture_content(name)).unwrap();

    let engine = BuildEngine::new(EngineOptions {
      worker_threads: Some(2),
      shell: None,
    })
    .unwrap();
    let ui = Rc::new(UiContext::new());
    let output = Arc::new(MemorySink::new());
    let mut services = ProjectServices::new(engine, ui.clone());
    services.output = output.clone();
    configure(&mut services);
    let node = ProjectNode::load(&path, services).unwrap();
    Self { temp, ui, output, node }
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.node.project_dir().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.node.project_dir().join(Path::new(relative_path))
  }

  /// How many output lines equal `line`.
  pub fn count_lines(&self, line: &str) -> usize {
    self.output.lines().iter().filter(|l| l.as_str() == line).count()
  }
}
