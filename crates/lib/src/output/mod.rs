//! Output groups: named sets of build outputs for one configuration.
//!
//! A group's outputs are the items named `<Target>Output` that its target adds
//! when built. They are computed on first query and cached until the owning
//! configuration changes.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::build::BuildError;
use crate::config::ConfigurationKey;
use crate::consts::ALL_OUTPUT_GROUPS_TARGET;
use crate::engine::{ItemInstance, ProjectInstance};

/// Group name to target, in display order.
pub const DEFAULT_OUTPUT_GROUPS: &[(&str, &str)] = &[
  ("Built", "BuiltProjectOutputGroup"),
  ("ContentFiles", "ContentFilesProjectOutputGroup"),
  ("LocalizedResourceDlls", "SatelliteDllsProjectOutputGroup"),
  ("Documentation", "DocumentationProjectOutputGroup"),
  ("Symbols", "DebugSymbolsProjectOutputGroup"),
  ("SourceFiles", "SourceFilesProjectOutputGroup"),
  ("XmlSerializer", "SGenFilesOutputGroup"),
];

/// Metadata flagging the key output of a group.
pub const IS_KEY_OUTPUT_METADATA: &str = "IsKeyOutput";

#[derive(Debug, Error)]
pub enum OutputError {
  #[error("unknown output group '{0}'")]
  UnknownGroup(String),

  #[error("output group target '{target}' failed to build")]
  BuildFailed { target: String },

  #[error(transparent)]
  Build(#[from] BuildError),
}

/// Builds targets for the catalog's configuration.
pub trait OutputBuilder {
  fn has_target(&self, target: &str) -> bool;

  /// Build `targets` in order and return the instance the build produced.
  fn build_targets(&self, targets: &[String]) -> Result<ProjectInstance, OutputError>;
}

/// One build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
  canonical_name: PathBuf,
  display_name: String,
  project_dir: PathBuf,
  metadata: BTreeMap<String, String>,
  is_key: bool,
}

impl Output {
  fn from_item(item: &ItemInstance, project_dir: &Path) -> Self {
    let is_key = item
      .metadata(IS_KEY_OUTPUT_METADATA)
      .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    Self {
      canonical_name: item.full_path().to_path_buf(),
      display_name: item.include().to_string(),
      project_dir: project_dir.to_path_buf(),
      metadata: item.custom_metadata().clone(),
      is_key,
    }
  }

  /// Full path of the output.
  pub fn canonical_name(&self) -> &Path {
    &self.canonical_name
  }

  pub fn display_name(&self) -> &str {
    &self.display_name
  }

  pub fn is_key_output(&self) -> bool {
    self.is_key
  }

  /// `file:///` URL of the output.
  pub fn deploy_source_url(&self) -> String {
    let path = self.canonical_name.to_string_lossy().replace('\\', "/");
    format!("file:///{}", path.trim_start_matches('/'))
  }

  /// Path relative to the project directory, `/`-separated; the full path when outside it.
  pub fn root_relative_url(&self) -> String {
    let relative = self
      .canonical_name
      .strip_prefix(&self.project_dir)
      .unwrap_or(&self.canonical_name);
    relative.to_string_lossy().replace('\\', "/")
  }

  /// Metadata value by name, case-insensitive.
  pub fn property(&self, name: &str) -> Option<&str> {
    self
      .metadata
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

#[derive(Debug)]
pub struct OutputGroup {
  name: String,
  target_name: String,
  configuration: ConfigurationKey,
  cached: RefCell<Option<Vec<Output>>>,
  valid: Cell<bool>,
}

impl OutputGroup {
  fn new(name: &str, target_name: &str, configuration: ConfigurationKey) -> Self {
    Self {
      name: name.to_string(),
      target_name: target_name.to_string(),
      configuration,
      cached: RefCell::new(None),
      valid: Cell::new(false),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn target_name(&self) -> &str {
    &self.target_name
  }

  pub fn configuration(&self) -> &ConfigurationKey {
    &self.configuration
  }

  pub fn is_valid(&self) -> bool {
    self.valid.get()
  }

  pub fn cached_outputs(&self) -> Option<Vec<Output>> {
    self.cached.borrow().clone()
  }

  pub fn invalidate(&self) {
    self.cached.replace(None);
    self.valid.set(false);
  }

  fn store(&self, outputs: Vec<Output>) {
    self.cached.replace(Some(outputs));
    self.valid.set(true);
  }
}

/// The output groups owned by one configuration.
#[derive(Debug)]
pub struct OutputGroupCatalog {
  configuration: ConfigurationKey,
  registrations: RefCell<Vec<(String, String)>>,
  groups: RefCell<Option<Vec<Rc<OutputGroup>>>>,
}

impl OutputGroupCatalog {
  pub fn new(configuration: ConfigurationKey) -> Self {
    Self {
      configuration,
      registrations: RefCell::new(
        DEFAULT_OUTPUT_GROUPS
          .iter()
          .map(|(name, target)| (name.to_string(), target.to_string()))
          .collect(),
      ),
      groups: RefCell::new(None),
    }
  }

  pub fn configuration(&self) -> &ConfigurationKey {
    &self.configuration
  }

  /// Map `name` to `target`, replacing an existing mapping. Existing groups are rebuilt on next access.
  pub fn register_group(&self, name: &str, target: &str) {
    {
      let mut registrations = self.registrations.borrow_mut();
      match registrations.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = target.to_string(),
        None => registrations.push((name.to_string(), target.to_string())),
      }
    }
    self.groups.replace(None);
  }

  /// The groups, created on first access. Outputs are not computed here.
  pub fn groups(&self) -> Vec<Rc<OutputGroup>> {
    if self.groups.borrow().is_none() {
      let created = self
        .registrations
        .borrow()
        .iter()
        .map(|(name, target)| Rc::new(OutputGroup::new(name, target, self.configuration.clone())))
        .collect();
      self.groups.replace(Some(created));
    }
    self.groups.borrow().clone().unwrap_or_default()
  }

  pub fn group(&self, name: &str) -> Option<Rc<OutputGroup>> {
    self.groups().into_iter().find(|g| g.name().eq_ignore_ascii_case(name))
  }

  /// Drop cached outputs of every group.
  pub fn invalidate(&self) {
    if let Some(groups) = self.groups.borrow().as_ref() {
      for group in groups {
        group.invalidate();
      }
      debug!(configuration = %self.configuration, "output groups invalidated");
    }
  }

  /// Outputs of group `name`, building its target when the cache is invalid.
  pub fn enumerate_outputs(&self, name: &str, builder: &dyn OutputBuilder) -> Result<Vec<Output>, OutputError> {
    let group = self
      .group(name)
      .ok_or_else(|| OutputError::UnknownGroup(name.to_string()))?;
    if group.is_valid()
      && let Some(outputs) = group.cached_outputs()
    {
      return Ok(outputs);
    }

    let mut targets = Vec::new();
    if builder.has_target(ALL_OUTPUT_GROUPS_TARGET) {
      targets.push(ALL_OUTPUT_GROUPS_TARGET.to_string());
    }
    if !builder.has_target(group.target_name()) {
      debug!(group = name, target = group.target_name(), "output group target not defined");
      group.store(Vec::new());
      return Ok(Vec::new());
    }
    targets.push(group.target_name().to_string());

    let instance = builder.build_targets(&targets)?;
    let item_type = format!("{}Output", group.target_name());
    let outputs: Vec<Output> = instance
      .items(&item_type)
      .map(|item| Output::from_item(item, instance.project_dir()))
      .collect();
    debug!(group = name, count = outputs.len(), "output group computed");
    group.store(outputs.clone());
    Ok(outputs)
  }

  /// The flagged key output of group `name`, else its first output.
  pub fn key_output(&self, name: &str, builder: &dyn OutputBuilder) -> Result<Option<Output>, OutputError> {
    let outputs = self.enumerate_outputs(name, builder)?;
    Ok(
      outputs
        .iter()
        .find(|o| o.is_key_output())
        .or_else(|| outputs.first())
        .cloned(),
    )
  }
}
