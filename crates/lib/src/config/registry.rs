//! The set of configurations a project declares.
//!
//! Configurations are not stored separately: they are the conditioned
//! property groups of the project file whose conditions parse to a key.
//! Adding, deleting or renaming a configuration rewrites those groups.

use std::rc::Rc;

use tracing::info;

use crate::engine::PropertyGroup;
use crate::property::PropertyStore;

use super::condition::{parse_condition, to_condition};
use super::key::{ConfigurationKey, DISPLAY_ANY_CPU, to_display_platform};
use super::ConfigError;

#[derive(Debug, Clone)]
pub struct ConfigurationRegistry {
  store: Rc<PropertyStore>,
}

impl ConfigurationRegistry {
  pub fn new(store: Rc<PropertyStore>) -> Self {
    Self { store }
  }

  /// Every declared configuration, in declaration order, without duplicates.
  pub fn configurations(&self) -> Vec<ConfigurationKey> {
    self.store.with_file(|file| {
      let mut keys: Vec<ConfigurationKey> = Vec::new();
      for key in file
        .property_groups
        .iter()
        .filter_map(|group| group.condition.as_deref())
        .map(parse_condition)
        .filter(|key| !key.is_empty())
      {
        if !keys.contains(&key) {
          keys.push(key);
        }
      }
      keys
    })
  }

  pub fn contains(&self, key: &ConfigurationKey) -> bool {
    self.configurations().contains(key)
  }

  pub fn configuration_names(&self) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for key in self.configurations() {
      if !names.iter().any(|n| n == key.config()) {
        names.push(key.config().to_string());
      }
    }
    names
  }

  /// Declared platforms in display form; `Any CPU` when none is declared.
  pub fn platform_names(&self) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for key in self.configurations().iter().filter(|k| k.has_platform()) {
      if !names.iter().any(|n| n == key.platform()) {
        names.push(key.platform().to_string());
      }
    }
    if names.is_empty() {
      names.push(DISPLAY_ANY_CPU.to_string());
    }
    names
  }

  /// Add configuration `name` for every platform, copying properties from `clone_from` when given.
  pub fn add_configuration(&self, name: &str, clone_from: Option<&str>) -> Result<(), ConfigError> {
    if self.configuration_names().iter().any(|n| n == name) {
      return Err(ConfigError::AlreadyExists(name.to_string()));
    }
    if let Some(source) = clone_from
      && !self.configuration_names().iter().any(|n| n == source)
    {
      return Err(ConfigError::NotFound(source.to_string()));
    }

    let platforms = self.platform_names();
    self.store.edit_file(|file| {
      for platform in &platforms {
        let key = ConfigurationKey::new(name, platform.as_str());
        let mut group = PropertyGroup::with_condition(to_condition(&key));
        if let Some(source) = clone_from {
          let source_key = key.with_config(source);
          if let Some(existing) = find_group(&file.property_groups, &source_key) {
            group.properties = existing.properties.clone();
          }
        }
        file.property_groups.push(group);
      }
    })?;
    info!(configuration = name, clone_from = ?clone_from, "configuration added");
    Ok(())
  }

  pub fn delete_configuration(&self, name: &str) -> Result<(), ConfigError> {
    if !self.configuration_names().iter().any(|n| n == name) {
      return Err(ConfigError::NotFound(name.to_string()));
    }
    self.store.edit_file(|file| {
      file
        .property_groups
        .retain(|group| group_key(group).is_none_or(|key| key.config() != name));
    })?;
    info!(configuration = name, "configuration deleted");
    Ok(())
  }

  pub fn rename_configuration(&self, old: &str, new: &str) -> Result<(), ConfigError> {
    let names = self.configuration_names();
    if !names.iter().any(|n| n == old) {
      return Err(ConfigError::NotFound(old.to_string()));
    }
    if names.iter().any(|n| n == new) {
      return Err(ConfigError::AlreadyExists(new.to_string()));
    }
    self.store.edit_file(|file| {
      for group in &mut file.property_groups {
        if let Some(key) = group_key(group)
          && key.config() == old
        {
          group.condition = Some(to_condition(&key.with_config(new)));
        }
      }
    })?;
    info!(from = old, to = new, "configuration renamed");
    Ok(())
  }

  /// Add platform `name` for every configuration, copying from `clone_from` when given.
  pub fn add_platform(&self, name: &str, clone_from: Option<&str>) -> Result<(), ConfigError> {
    let platform = to_display_platform(name);
    let declared: Vec<String> = self
      .configurations()
      .iter()
      .filter(|k| k.has_platform())
      .map(|k| k.platform().to_string())
      .collect();
    if declared.contains(&platform) {
      return Err(ConfigError::AlreadyExists(platform));
    }

    let configs = self.configuration_names();
    self.store.edit_file(|file| {
      for config in &configs {
        let key = ConfigurationKey::new(config.as_str(), platform.as_str());
        let mut group = PropertyGroup::with_condition(to_condition(&key));
        if let Some(source) = clone_from
          && let Some(existing) = find_group(&file.property_groups, &key.with_platform(source))
        {
          group.properties = existing.properties.clone();
        }
        file.property_groups.push(group);
      }
    })?;
    info!(%platform, clone_from = ?clone_from, "platform added");
    Ok(())
  }

  pub fn delete_platform(&self, name: &str) -> Result<(), ConfigError> {
    let platform = to_display_platform(name);
    if !self.configurations().iter().any(|k| k.platform() == platform) {
      return Err(ConfigError::NotFound(platform));
    }
    self.store.edit_file(|file| {
      file
        .property_groups
        .retain(|group| group_key(group).is_none_or(|key| key.platform() != platform));
    })?;
    info!(%platform, "platform deleted");
    Ok(())
  }
}

fn group_key(group: &PropertyGroup) -> Option<ConfigurationKey> {
  group
    .condition
    .as_deref()
    .map(parse_condition)
    .filter(|key| !key.is_empty())
}

fn find_group<'a>(groups: &'a [PropertyGroup], key: &ConfigurationKey) -> Option<&'a PropertyGroup> {
  groups.iter().find(|group| group_key(group).as_ref() == Some(key))
}
