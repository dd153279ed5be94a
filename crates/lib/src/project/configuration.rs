//! One (configuration, platform) pair of a project.
//!
//! Binds a [`ConfigurationKey`] to the shared property store and build
//! coordinator, and owns that configuration's output groups and evaluated
//! snapshot. Writes through the store, from this façade or anywhere else,
//! invalidate both before the write returns.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use crate::build::{BuildCoordinator, BuildMode, BuildRequest, Submitted};
use crate::config::ConfigurationKey;
use crate::engine::ProjectInstance;
use crate::output::{Output, OutputBuilder, OutputError, OutputGroup, OutputGroupCatalog};
use crate::property::{ChangeScope, ProjectOptions, PropertyError, PropertyListener, PropertyStore};

use super::launch::{LaunchError, LaunchFlags, LaunchInfo, LaunchSource, derive_launch_info};

pub struct ProjectConfiguration {
  key: ConfigurationKey,
  store: Rc<PropertyStore>,
  coordinator: BuildCoordinator,
  outputs: OutputGroupCatalog,
  cache: RefCell<Option<ProjectInstance>>,
  cache_generation: Cell<u64>,
  shell: String,
}

impl std::fmt::Debug for ProjectConfiguration {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProjectConfiguration")
      .field("key", &self.key)
      .field("cached", &self.cache.borrow().is_some())
      .field("cache_generation", &self.cache_generation.get())
      .finish()
  }
}

impl ProjectConfiguration {
  /// Create the façade and subscribe it to store changes.
  pub fn new(key: ConfigurationKey, store: Rc<PropertyStore>, coordinator: BuildCoordinator, shell: &str) -> Rc<Self> {
    let configuration = Rc::new(Self {
      outputs: OutputGroupCatalog::new(key.clone()),
      key,
      store: store.clone(),
      coordinator,
      cache: RefCell::new(None),
      cache_generation: Cell::new(0),
      shell: shell.to_string(),
    });
    let listener: Rc<dyn PropertyListener> = configuration.clone();
    store.subscribe(Rc::downgrade(&listener));
    configuration
  }

  pub fn key(&self) -> &ConfigurationKey {
    &self.key
  }

  /// The evaluated snapshot for this configuration, re-evaluated when the store changed since it was taken.
  pub fn snapshot(&self) -> ProjectInstance {
    let generation = self.store.generation();
    if self.cache_generation.get() != generation {
      self.cache.replace(None);
    }
    if let Some(instance) = self.cache.borrow().as_ref() {
      return instance.clone();
    }
    let instance = self.store.create_instance(&self.key);
    self.cache.replace(Some(instance.clone()));
    self.cache_generation.set(generation);
    instance
  }

  pub fn get_configuration_property(&self, name: &str, reset_cache: bool) -> Option<String> {
    if reset_cache {
      self.cache.replace(None);
    }
    self.snapshot().property(name).map(str::to_string)
  }

  /// Write `name` for this configuration. Output groups are invalidated before this returns.
  pub fn set_configuration_property(&self, name: &str, value: &str) -> Result<(), PropertyError> {
    self.store.set_configuration_property(&self.key, name, value)?;
    Ok(())
  }

  pub fn options(&self) -> ProjectOptions {
    ProjectOptions::from_instance(&self.snapshot())
  }

  pub fn output_groups(&self) -> Vec<Rc<OutputGroup>> {
    self.outputs.groups()
  }

  pub fn register_output_group(&self, name: &str, target: &str) {
    self.outputs.register_group(name, target);
  }

  pub fn enumerate_outputs(&self, group: &str) -> Result<Vec<Output>, OutputError> {
    self.outputs.enumerate_outputs(group, self)
  }

  pub fn key_output(&self, group: &str) -> Result<Option<Output>, OutputError> {
    self.outputs.key_output(group, self)
  }

  pub fn derive_launch_info(&self, flags: LaunchFlags) -> Result<LaunchInfo, LaunchError> {
    derive_launch_info(self, flags)
  }

  fn invalidate(&self) {
    self.cache.replace(None);
    self.outputs.invalidate();
  }
}

impl PropertyListener for ProjectConfiguration {
  fn property_changed(&self, scope: &ChangeScope) {
    if scope.affects(&self.key) {
      debug!(configuration = %self.key, "configuration invalidated");
      self.invalidate();
    }
  }
}

impl OutputBuilder for ProjectConfiguration {
  fn has_target(&self, target: &str) -> bool {
    self.snapshot().has_target(target)
  }

  fn build_targets(&self, targets: &[String]) -> Result<ProjectInstance, OutputError> {
    let target = targets.join(";");
    let request = BuildRequest::new(self.key.clone(), Some(&target), BuildMode::Sync).design_time();
    match self.coordinator.submit(request, self.snapshot(), None)? {
      Submitted::Completed(result) if result.is_successful() => {
        result.into_produced().ok_or(OutputError::BuildFailed { target })
      }
      _ => Err(OutputError::BuildFailed { target }),
    }
  }
}

impl LaunchSource for ProjectConfiguration {
  fn configuration_property(&self, name: &str) -> Option<String> {
    self.get_configuration_property(name, false)
  }

  fn project_property(&self, name: &str) -> Option<String> {
    self.get_configuration_property(name, false)
  }

  fn project_dir(&self) -> PathBuf {
    self.store.project_dir()
  }

  fn output_assembly(&self) -> PathBuf {
    self.options().output_assembly
  }

  fn shell(&self) -> String {
    self.shell.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::{BuildEngine, EngineOptions, PropertyMap};
  use crate::property::AllowAllEdits;
  use crate::ui::UiContext;
  use tempfile::TempDir;

  const PROJECT: &str = r#"{
    "property_groups": [
      { "properties": { "OutputType": "Library", "AssemblyName": "Lib" } },
      { "condition": " '$(Configuration)|$(Platform)' == 'Debug|AnyCPU' ",
        "properties": { "OutputPath": "bin/Debug/" } },
      { "condition": " '$(Configuration)|$(Platform)' == 'Release|AnyCPU' ",
        "properties": { "OutputPath": "bin/Release/" } }
    ],
    "targets": {
      "BuiltProjectOutputGroup": {
        "tasks": [
          { "task": "add_item", "item_type": "BuiltProjectOutputGroupOutput", "include": "$(OutputPath)Lib.dll",
            "metadata": { "IsKeyOutput": "true" } }
        ]
      }
    }
  }"#;

  struct Fixture {
    _temp: TempDir,
    store: Rc<PropertyStore>,
    debug: Rc<ProjectConfiguration>,
    release: Rc<ProjectConfiguration>,
  }

  fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("lib.projsys.json");
    std::fs::write(&path, PROJECT).unwrap();
    let store = Rc::new(PropertyStore::load(&path, PropertyMap::new(), Rc::new(AllowAllEdits)).unwrap());
    let engine = BuildEngine::new(EngineOptions {
      worker_threads: Some(1),
      shell: None,
    })
    .unwrap();
    let coordinator = BuildCoordinator::new(engine, None, Rc::new(UiContext::new()));
    let debug = ProjectConfiguration::new(
      ConfigurationKey::new("Debug", "AnyCPU"),
      store.clone(),
      coordinator.clone(),
      "cmd.exe",
    );
    let release = ProjectConfiguration::new(ConfigurationKey::new("Release", "AnyCPU"), store.clone(), coordinator, "cmd.exe");
    Fixture {
      _temp: temp,
      store,
      debug,
      release,
    }
  }

  #[test]
  fn reads_are_per_configuration() {
    let f = fixture();
    assert_eq!(f.debug.get_configuration_property("OutputPath", false).as_deref(), Some("bin/Debug/"));
    assert_eq!(f.release.get_configuration_property("OutputPath", false).as_deref(), Some("bin/Release/"));
  }

  #[test]
  fn writes_invalidate_only_the_affected_configuration() {
    let f = fixture();
    f.debug.enumerate_outputs("Built").unwrap();
    f.release.enumerate_outputs("Built").unwrap();
    assert!(f.debug.output_groups()[0].is_valid());

    f.debug.set_configuration_property("OutputPath", "out/").unwrap();
    assert!(f.store.is_dirty());
    assert!(!f.debug.output_groups()[0].is_valid());
    assert!(f.release.output_groups()[0].is_valid());
    assert_eq!(f.debug.get_configuration_property("OutputPath", false).as_deref(), Some("out/"));
  }

  #[test]
  fn project_writes_invalidate_every_configuration() {
    let f = fixture();
    f.release.enumerate_outputs("Built").unwrap();
    f.store.set("AssemblyName", "Other").unwrap();
    assert!(!f.release.output_groups()[0].is_valid());
  }

  #[test]
  fn key_output_comes_from_a_design_time_build() {
    let f = fixture();
    let output = f.release.key_output("Built").unwrap().unwrap();
    assert_eq!(output.root_relative_url(), "bin/Release/Lib.dll");
    assert!(output.is_key_output());
  }

  #[test]
  fn library_launch_is_refused() {
    let f = fixture();
    assert_eq!(
      f.debug.derive_launch_info(LaunchFlags::default()),
      Err(LaunchError::ClassLibraryCannotBeStartedDirectly)
    );
  }
}
