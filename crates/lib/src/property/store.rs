//! The project property store.
//!
//! Wraps the engine's project handle for one project file. Reads go through a
//! live evaluated instance for the active configuration; writes pass the edit
//! gate, mark the project dirty, bump the generation counter and notify
//! listeners before returning.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::config::{ConfigurationKey, parse_condition, to_condition};
use crate::consts::{CONFIGURATION_PROPERTY, PLATFORM_PROPERTY};
use crate::engine::{ItemInstance, Project, ProjectFile, ProjectInstance, PropertyGroup, PropertyMap};

use super::gate::EditGate;
use super::options::ProjectOptions;
use super::PropertyError;

/// What a write touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeScope {
  /// Project-wide state: unconditioned properties, items, configurations.
  Project,
  /// Properties of one configuration only.
  Configuration(ConfigurationKey),
}

impl ChangeScope {
  pub fn affects(&self, key: &ConfigurationKey) -> bool {
    match self {
      ChangeScope::Project => true,
      ChangeScope::Configuration(changed) => changed == key,
    }
  }
}

/// Notified synchronously, on the UI context, after every store write.
pub trait PropertyListener {
  fn property_changed(&self, scope: &ChangeScope);
}

pub struct PropertyStore {
  project: RefCell<Project>,
  active: RefCell<ConfigurationKey>,
  live: RefCell<Option<ProjectInstance>>,
  dirty: Cell<bool>,
  generation: Cell<u64>,
  gate: Rc<dyn EditGate>,
  listeners: RefCell<Vec<Weak<dyn PropertyListener>>>,
}

impl std::fmt::Debug for PropertyStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PropertyStore")
      .field("path", &self.path())
      .field("active", &*self.active.borrow())
      .field("dirty", &self.dirty.get())
      .field("generation", &self.generation.get())
      .finish()
  }
}

impl PropertyStore {
  pub fn new(project: Project, gate: Rc<dyn EditGate>) -> Self {
    let active = ConfigurationKey::new(
      project.global_properties().get(CONFIGURATION_PROPERTY).unwrap_or_default(),
      project.global_properties().get(PLATFORM_PROPERTY).unwrap_or_default(),
    );
    Self {
      project: RefCell::new(project),
      active: RefCell::new(active),
      live: RefCell::new(None),
      dirty: Cell::new(false),
      generation: Cell::new(0),
      gate,
      listeners: RefCell::new(Vec::new()),
    }
  }

  /// Load a project file.
  pub fn load(path: &Path, globals: PropertyMap, gate: Rc<dyn EditGate>) -> Result<Self, PropertyError> {
    Ok(Self::new(Project::load(path, globals)?, gate))
  }

  pub fn path(&self) -> PathBuf {
    self.project.borrow().path().to_path_buf()
  }

  pub fn project_dir(&self) -> PathBuf {
    self.project.borrow().directory().to_path_buf()
  }

  /// Monotonic counter bumped on every change; stands in for a last-modified timestamp.
  pub fn generation(&self) -> u64 {
    self.generation.get()
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty.get()
  }

  pub fn set_dirty(&self, dirty: bool) {
    self.dirty.set(dirty);
  }

  pub fn subscribe(&self, listener: Weak<dyn PropertyListener>) {
    self.listeners.borrow_mut().push(listener);
  }

  pub fn active_configuration(&self) -> ConfigurationKey {
    self.active.borrow().clone()
  }

  /// Point the live instance at `key`. The next read re-evaluates.
  pub fn set_active_configuration(&self, key: &ConfigurationKey) {
    if *self.active.borrow() == *key {
      return;
    }
    debug!(configuration = %key, "active configuration changed");
    self.active.replace(key.clone());
    self.live.replace(None);
  }

  /// Read an evaluated property for the active configuration.
  ///
  /// Re-synchronises the live instance first when `force_refresh` is set or
  /// none exists. Undefined properties read as `None`.
  pub fn get(&self, name: &str, force_refresh: bool) -> Option<String> {
    if force_refresh || self.live.borrow().is_none() {
      self.refresh_live();
    }
    self
      .live
      .borrow()
      .as_ref()
      .and_then(|instance| instance.property(name))
      .map(str::to_string)
  }

  /// A snapshot of the live instance for the active configuration.
  pub fn live_instance(&self) -> ProjectInstance {
    if self.live.borrow().is_none() {
      self.refresh_live();
    }
    match self.live.borrow().as_ref() {
      Some(instance) => instance.clone(),
      None => self.create_instance(&self.active_configuration()),
    }
  }

  fn refresh_live(&self) {
    let key = self.active_configuration();
    {
      let mut project = self.project.borrow_mut();
      project.set_global_property(CONFIGURATION_PROPERTY, key.config());
      if key.has_platform() {
        project.set_global_property(PLATFORM_PROPERTY, &key.engine_platform());
      } else {
        project.remove_global_property(PLATFORM_PROPERTY);
      }
    }
    let instance = self.project.borrow().create_instance();
    self.live.replace(Some(instance));
  }

  /// Set a project-wide property. Returns false when the value was already current.
  pub fn set(&self, name: &str, value: &str) -> Result<bool, PropertyError> {
    if self.get(name, false).as_deref() == Some(value) {
      return Ok(false);
    }
    self.query_edit()?;
    self
      .project
      .borrow_mut()
      .file_mut()
      .unconditioned_group_mut()
      .properties
      .set(name, value);
    debug!(property = name, value, "project property set");
    self.changed(ChangeScope::Project);
    Ok(true)
  }

  /// Evaluate `name` for `key` without touching the live instance.
  pub fn get_configuration_property(&self, key: &ConfigurationKey, name: &str) -> Option<String> {
    self.create_instance(key).property(name).map(str::to_string)
  }

  /// Write `name` into the property group selected by `key`, creating the group if needed.
  pub fn set_configuration_property(&self, key: &ConfigurationKey, name: &str, value: &str) -> Result<bool, PropertyError> {
    if self.get_configuration_property(key, name).as_deref() == Some(value) {
      return Ok(false);
    }
    self.query_edit()?;
    {
      let mut project = self.project.borrow_mut();
      let groups = &mut project.file_mut().property_groups;
      let index = match groups
        .iter()
        .position(|group| group.condition.as_deref().is_some_and(|c| parse_condition(c) == *key))
      {
        Some(index) => index,
        None => {
          groups.push(PropertyGroup::with_condition(to_condition(key)));
          groups.len() - 1
        }
      };
      groups[index].properties.set(name, value);
    }
    debug!(configuration = %key, property = name, value, "configuration property set");
    self.changed(ChangeScope::Configuration(key.clone()));
    Ok(true)
  }

  /// Evaluate a fresh instance for `key`.
  pub fn create_instance(&self, key: &ConfigurationKey) -> ProjectInstance {
    let mut overrides = PropertyMap::new();
    overrides.set(CONFIGURATION_PROPERTY, key.config());
    if key.has_platform() {
      overrides.set(PLATFORM_PROPERTY, key.engine_platform());
    }
    self.project.borrow().create_instance_with(&overrides)
  }

  pub fn options(&self, key: &ConfigurationKey) -> ProjectOptions {
    ProjectOptions::from_instance(&self.create_instance(key))
  }

  /// Evaluated items of `item_type` for the active configuration.
  pub fn items(&self, item_type: &str) -> Vec<ItemInstance> {
    self.live_instance().items(item_type).cloned().collect()
  }

  pub fn with_file<R>(&self, f: impl FnOnce(&ProjectFile) -> R) -> R {
    f(self.project.borrow().file())
  }

  /// Apply a structural edit to the project document.
  pub fn edit_file<R>(&self, f: impl FnOnce(&mut ProjectFile) -> R) -> Result<R, PropertyError> {
    self.query_edit()?;
    let result = f(self.project.borrow_mut().file_mut());
    self.changed(ChangeScope::Project);
    Ok(result)
  }

  pub fn save(&self) -> Result<(), PropertyError> {
    let path = self.path();
    self.save_as(&path)
  }

  /// Write the project to `path` and make it the project's file.
  pub fn save_as(&self, path: &Path) -> Result<(), PropertyError> {
    if !self.gate.query_edit_files(&[path.to_path_buf()]) {
      return Err(PropertyError::EditDenied {
        path: path.to_path_buf(),
      });
    }
    let moved = path != self.path().as_path();
    self.project.borrow().save_to(path)?;
    if moved {
      self.project.borrow_mut().set_path(path.to_path_buf());
      self.changed(ChangeScope::Project);
    }
    self.dirty.set(false);
    info!(path = %path.display(), "project saved");
    Ok(())
  }

  /// Discard in-memory edits and re-read the project file.
  pub fn reload(&self) -> Result<(), PropertyError> {
    self.project.borrow_mut().reload()?;
    self.changed(ChangeScope::Project);
    self.dirty.set(false);
    info!(path = %self.path().display(), "project reloaded");
    Ok(())
  }

  /// Ask the edit gate whether the project file may be changed.
  pub fn query_edit(&self) -> Result<(), PropertyError> {
    let path = self.path();
    if self.gate.query_edit_files(std::slice::from_ref(&path)) {
      Ok(())
    } else {
      Err(PropertyError::EditDenied { path })
    }
  }

  fn changed(&self, scope: ChangeScope) {
    self.dirty.set(true);
    self.generation.set(self.generation.get() + 1);
    self.live.replace(None);

    // Collected first so listeners may subscribe while being notified.
    let listeners: Vec<Rc<dyn PropertyListener>> = {
      let mut registered = self.listeners.borrow_mut();
      registered.retain(|l| l.strong_count() > 0);
      registered.iter().filter_map(Weak::upgrade).collect()
    };
    for listener in listeners {
      listener.property_changed(&scope);
    }
  }
}
