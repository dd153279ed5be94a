//! Subcommand implementations and the project session they share.

mod build;
mod configs;
mod launch;
mod outputs;
mod prop;
mod rename;

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use projsys_lib::build::WriterSink;
use projsys_lib::config::ConfigurationKey;
use projsys_lib::engine::BuildEngine;
use projsys_lib::project::{ProjectNode, ProjectServices};
use projsys_lib::settings::Settings;
use projsys_lib::ui::UiContext;

pub use build::{cmd_build, cmd_clean, cmd_rebuild};
pub use configs::{ConfigsCommand, cmd_configs};
pub use launch::cmd_launch;
pub use outputs::cmd_outputs;
pub use prop::{PropCommand, cmd_prop};
pub use rename::cmd_rename;

const PROJECT_SUFFIX: &str = ".projsys.json";

/// A loaded project and the engine it builds with. The engine shuts down on drop.
pub struct Session {
  pub ui: Rc<UiContext>,
  pub node: Rc<ProjectNode>,
  engine: BuildEngine,
}

impl Session {
  pub fn open(project: Option<&Path>) -> Result<Self> {
    let path = match project {
      Some(path) => path.to_path_buf(),
      None => find_project(&std::env::current_dir().context("Failed to read current directory")?)?,
    };
    let path = dunce::canonicalize(&path).with_context(|| format!("Failed to resolve {}", path.display()))?;
    let settings = Settings::load();
    let engine = BuildEngine::new(settings.engine_options()).context("Failed to start build engine")?;
    let ui = Rc::new(UiContext::new());
    let mut services = ProjectServices::from_settings(&settings, engine.clone(), ui.clone());
    services.output = Arc::new(WriterSink::new(std::io::stdout()));
    let node = ProjectNode::load(&path, services).with_context(|| format!("Failed to load {}", path.display()))?;
    debug!(path = %path.display(), "project opened");
    Ok(Self { ui, node, engine })
  }

  /// `raw` as a configuration key, or the active configuration.
  pub fn configuration_key(&self, raw: Option<&str>) -> Result<ConfigurationKey> {
    let Some(raw) = raw else {
      return Ok(self.node.active_configuration());
    };
    let key: ConfigurationKey = match raw.parse() {
      Ok(key) => key,
      Err(never) => match never {},
    };
    let registry = self.node.registry();
    let known = registry.contains(&key)
      || (!key.has_platform() && registry.configuration_names().iter().any(|n| n == key.config()));
    if !known {
      bail!(
        "Unknown configuration '{}'. Known: {}",
        raw,
        registry
          .configurations()
          .iter()
          .map(ToString::to_string)
          .collect::<Vec<_>>()
          .join(", ")
      );
    }
    Ok(key)
  }

  /// Persist edits made by a command.
  pub fn save(&self) -> Result<()> {
    if self.node.is_dirty() {
      self.node.save().context("Failed to save project")?;
    }
    Ok(())
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    self.engine.shutdown();
  }
}

/// The single project file in `dir`.
fn find_project(dir: &Path) -> Result<PathBuf> {
  let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
    .with_context(|| format!("Failed to list {}", dir.display()))?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|path| {
      path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(PROJECT_SUFFIX))
    })
    .collect();
  match found.len() {
    0 => bail!("No *{} file in {}. Use --project.", PROJECT_SUFFIX, dir.display()),
    1 => Ok(found.remove(0)),
    _ => bail!("Several *{} files in {}. Use --project.", PROJECT_SUFFIX, dir.display()),
  }
}
