//! Project file model and the loaded project handle.
//!
//! A project file is a JSON document holding conditioned property groups,
//! items and targets. The file is treated as the persisted state of the
//! project; the project system edits it in memory and saves it back.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::eval::evaluate;
use super::instance::ProjectInstance;
use super::properties::{PropertyList, PropertyMap};
use super::types::EngineError;

/// A group of properties applied when its condition holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroup {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(default)]
  pub properties: PropertyList,
}

impl PropertyGroup {
  pub fn unconditioned() -> Self {
    Self::default()
  }

  pub fn with_condition(condition: impl Into<String>) -> Self {
    Self {
      condition: Some(condition.into()),
      properties: PropertyList::new(),
    }
  }

  pub fn is_unconditioned(&self) -> bool {
    self.condition.as_deref().is_none_or(|c| c.trim().is_empty())
  }
}

/// An item declaration; `include` may hold several `;`-separated entries and wildcards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
  #[serde(rename = "type")]
  pub item_type: String,
  pub include: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exclude: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata: BTreeMap<String, String>,
}

impl ItemDef {
  pub fn new(item_type: impl Into<String>, include: impl Into<String>) -> Self {
    Self {
      item_type: item_type.into(),
      include: include.into(),
      ..Default::default()
    }
  }

  pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.metadata.insert(name.into(), value.into());
    self
  }
}

/// Importance of a `message` task, used for verbosity filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
  High,
  #[default]
  Normal,
  Low,
}

/// A single unit of work inside a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
  /// Run a shell command.
  Exec {
    command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(default)]
    continue_on_error: bool,
  },
  MakeDir {
    path: String,
  },
  Copy {
    from: String,
    to: String,
    #[serde(default)]
    skip_unchanged: bool,
  },
  Delete {
    path: String,
  },
  Message {
    text: String,
    #[serde(default)]
    importance: Importance,
  },
  Warning {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
  },
  Error {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
  },
  /// Add an item to the instance being built.
  AddItem {
    item_type: String,
    include: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
  },
  SetProperty {
    name: String,
    value: String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(flatten)]
  pub task: Task,
}

impl From<Task> for TaskSpec {
  fn from(task: Task) -> Self {
    Self { condition: None, task }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetDef {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  #[serde(default)]
  pub tasks: Vec<TaskSpec>,
}

/// The on-disk project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub default_targets: Vec<String>,
  #[serde(default)]
  pub property_groups: Vec<PropertyGroup>,
  #[serde(default)]
  pub items: Vec<ItemDef>,
  #[serde(default)]
  pub targets: BTreeMap<String, TargetDef>,
}

impl ProjectFile {
  pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(content)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  /// The first unconditioned property group, created when missing.
  pub fn unconditioned_group_mut(&mut self) -> &mut PropertyGroup {
    let index = match self.property_groups.iter().position(PropertyGroup::is_unconditioned) {
      Some(index) => index,
      None => {
        self.property_groups.insert(0, PropertyGroup::unconditioned());
        0
      }
    };
    &mut self.property_groups[index]
  }

  /// Value of `name` in the first unconditioned group that defines it.
  pub fn unconditioned_property(&self, name: &str) -> Option<&str> {
    self
      .property_groups
      .iter()
      .filter(|group| group.is_unconditioned())
      .find_map(|group| group.properties.get(name))
  }
}

/// A project file loaded with a set of global properties.
#[derive(Debug, Clone)]
pub struct Project {
  path: PathBuf,
  file: ProjectFile,
  global_properties: PropertyMap,
}

impl Project {
  /// Load and parse a project file.
  pub fn load(path: &Path, global_properties: PropertyMap) -> Result<Self, EngineError> {
    let content = fs::read_to_string(path).map_err(|source| EngineError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file = ProjectFile::from_json(&content).map_err(|source| EngineError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    debug!(path = %path.display(), "loaded project file");

    Ok(Self {
      path,
      file,
      global_properties,
    })
  }

  /// Wrap an in-memory project file.
  pub fn from_file(path: PathBuf, file: ProjectFile, global_properties: PropertyMap) -> Self {
    Self {
      path,
      file,
      global_properties,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn directory(&self) -> &Path {
    self.path.parent().unwrap_or_else(|| Path::new("."))
  }

  pub fn file(&self) -> &ProjectFile {
    &self.file
  }

  pub fn file_mut(&mut self) -> &mut ProjectFile {
    &mut self.file
  }

  pub fn global_properties(&self) -> &PropertyMap {
    &self.global_properties
  }

  /// Set a global property. Returns true when the value changed.
  pub fn set_global_property(&mut self, name: &str, value: &str) -> bool {
    self.global_properties.set(name, value)
  }

  /// Drop a global property. Returns true when one was set.
  pub fn remove_global_property(&mut self, name: &str) -> bool {
    self.global_properties.remove(name).is_some()
  }

  /// Evaluate the project into a fresh, immutable snapshot.
  pub fn create_instance(&self) -> ProjectInstance {
    evaluate(&self.path, &self.file, &self.global_properties)
  }

  /// Evaluate with extra global properties layered over the project's own.
  pub fn create_instance_with(&self, overrides: &PropertyMap) -> ProjectInstance {
    let mut globals = self.global_properties.clone();
    for (name, value) in overrides.iter() {
      globals.set(name, value);
    }
    evaluate(&self.path, &self.file, &globals)
  }

  /// Write the project file to `path` atomically.
  ///
  /// The document is written to a temp file in the target directory and then
  /// persisted over the destination.
  pub fn save_to(&self, path: &Path) -> Result<(), EngineError> {
    let content = self.file.to_json().map_err(EngineError::Serialize)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

    let write_err = |source| EngineError::Write {
      path: path.to_path_buf(),
      source,
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.write_all(b"\n").map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
  }

  /// Replace the in-memory document with the file's current content.
  pub fn reload(&mut self) -> Result<(), EngineError> {
    let reloaded = Self::load(&self.path, self.global_properties.clone())?;
    self.file = reloaded.file;
    Ok(())
  }

  /// Point the project at a new file path (used by save-as).
  pub fn set_path(&mut self, path: PathBuf) {
    self.path = path;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  const SAMPLE: &str = r#"{
    "default_targets": ["Build"],
    "property_groups": [
      { "properties": { "OutputType": "exe", "AssemblyName": "App" } },
      { "condition": " '$(Configuration)|$(Platform)' == 'Debug|AnyCPU' ",
        "properties": { "OutputPath": "bin/Debug/" } }
    ],
    "items": [ { "type": "Compile", "include": "main.cs" } ],
    "targets": {
      "Build": { "tasks": [ { "task": "message", "text": "hi", "condition": "'1' == '1'" } ] }
    }
  }"#;

  #[test]
  fn parses_sample_document() {
    let file = ProjectFile::from_json(SAMPLE).unwrap();
    assert_eq!(file.default_targets, vec!["Build"]);
    assert_eq!(file.property_groups.len(), 2);
    assert_eq!(file.unconditioned_property("outputtype"), Some("exe"));

    let build = &file.targets["Build"];
    assert_eq!(build.tasks[0].condition.as_deref(), Some("'1' == '1'"));
    assert!(matches!(build.tasks[0].task, Task::Message { .. }));
  }

  #[test]
  fn save_then_load_keeps_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.projsys.json");
    std::fs::write(&path, SAMPLE).unwrap();

    let mut project = Project::load(&path, PropertyMap::new()).unwrap();
    project.file_mut().unconditioned_group_mut().properties.set("RootNamespace", "App");
    project.save_to(&path).unwrap();

    let reloaded = Project::load(&path, PropertyMap::new()).unwrap();
    assert_eq!(reloaded.file(), project.file());
    assert_eq!(reloaded.file().unconditioned_property("RootNamespace"), Some("App"));
  }

  #[test]
  fn load_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = Project::load(&path, PropertyMap::new()).unwrap_err();
    assert!(matches!(err, EngineError::Parse { .. }));
  }

  #[test]
  fn unconditioned_group_is_created_on_demand() {
    let mut file = ProjectFile::default();
    file.property_groups.push(PropertyGroup::with_condition("'$(Configuration)' == 'Debug'"));
    file.unconditioned_group_mut().properties.set("A", "1");
    assert!(file.property_groups[0].is_unconditioned());
    assert_eq!(file.property_groups.len(), 2);
  }
}
