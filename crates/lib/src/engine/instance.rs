//! Evaluated, point-in-time project snapshots.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::project::TargetDef;
use super::properties::PropertyMap;
use crate::util::hash::{Fingerprint, fingerprint};

/// Where the engine is allowed to run a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeAffinity {
  #[default]
  Any,
  InProc,
  OutOfProc,
}

/// An evaluated item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInstance {
  item_type: String,
  include: String,
  metadata: BTreeMap<String, String>,
  full_path: PathBuf,
}

impl ItemInstance {
  pub fn new(item_type: &str, include: String, metadata: BTreeMap<String, String>, dir: &Path) -> Self {
    let full_path = dir.join(&include);
    Self {
      item_type: item_type.to_string(),
      include,
      metadata,
      full_path,
    }
  }

  pub fn item_type(&self) -> &str {
    &self.item_type
  }

  pub fn include(&self) -> &str {
    &self.include
  }

  pub fn full_path(&self) -> &Path {
    &self.full_path
  }

  /// Metadata value, including the well-known `FullPath`, `Identity`,
  /// `Filename`, `Extension` and `RelativeDir` names.
  pub fn metadata(&self, name: &str) -> Option<String> {
    if let Some((_, value)) = self.metadata.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
      return Some(value.clone());
    }
    match name.to_ascii_lowercase().as_str() {
      "fullpath" => Some(self.full_path.to_string_lossy().to_string()),
      "identity" => Some(self.include.clone()),
      "filename" => self.full_path.file_stem().map(|s| s.to_string_lossy().to_string()),
      "extension" => Some(
        self
          .full_path
          .extension()
          .map(|e| format!(".{}", e.to_string_lossy()))
          .unwrap_or_default(),
      ),
      "relativedir" => Some(
        Path::new(&self.include)
          .parent()
          .map(|p| p.to_string_lossy().to_string())
          .filter(|p| !p.is_empty())
          .map(|p| format!("{p}/"))
          .unwrap_or_default(),
      ),
      _ => None,
    }
  }

  pub fn custom_metadata(&self) -> &BTreeMap<String, String> {
    &self.metadata
  }
}

/// A project evaluated for one set of global properties.
///
/// Instances never change once handed out: the engine builds a clone, and
/// re-evaluation produces a new instance rather than mutating an old one.
#[derive(Debug, Clone)]
pub struct ProjectInstance {
  project_path: PathBuf,
  properties: PropertyMap,
  global_properties: PropertyMap,
  items: Vec<ItemInstance>,
  targets: Arc<BTreeMap<String, TargetDef>>,
  default_targets: Vec<String>,
  node_affinity: NodeAffinity,
}

impl ProjectInstance {
  pub(crate) fn new(
    project_path: PathBuf,
    properties: PropertyMap,
    global_properties: PropertyMap,
    items: Vec<ItemInstance>,
    targets: BTreeMap<String, TargetDef>,
    default_targets: Vec<String>,
  ) -> Self {
    Self {
      project_path,
      properties,
      global_properties,
      items,
      targets: Arc::new(targets),
      default_targets,
      node_affinity: NodeAffinity::Any,
    }
  }

  pub fn project_path(&self) -> &Path {
    &self.project_path
  }

  pub fn project_dir(&self) -> &Path {
    self.project_path.parent().unwrap_or_else(|| Path::new("."))
  }

  pub fn property(&self, name: &str) -> Option<&str> {
    self.properties.get(name)
  }

  pub fn properties(&self) -> &PropertyMap {
    &self.properties
  }

  pub fn set_property(&mut self, name: &str, value: &str) {
    self.properties.set(name, value);
  }

  pub fn global_property(&self, name: &str) -> Option<&str> {
    self.global_properties.get(name)
  }

  /// Set a property as global: it is visible as a property and recorded as a global.
  pub fn set_global_property(&mut self, name: &str, value: &str) {
    self.global_properties.set(name, value);
    self.properties.set(name, value);
  }

  pub fn items(&self, item_type: &str) -> impl Iterator<Item = &ItemInstance> {
    let item_type = item_type.to_string();
    self
      .items
      .iter()
      .filter(move |item| item.item_type().eq_ignore_ascii_case(&item_type))
  }

  pub fn all_items(&self) -> &[ItemInstance] {
    &self.items
  }

  pub fn add_item(&mut self, item: ItemInstance) {
    self.items.push(item);
  }

  pub fn target(&self, name: &str) -> Option<&TargetDef> {
    self.targets.get(name).or_else(|| {
      self
        .targets
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
    })
  }

  pub fn has_target(&self, name: &str) -> bool {
    self.target(name).is_some()
  }

  pub fn target_names(&self) -> impl Iterator<Item = &str> {
    self.targets.keys().map(String::as_str)
  }

  pub fn default_targets(&self) -> &[String] {
    &self.default_targets
  }

  pub fn node_affinity(&self) -> NodeAffinity {
    self.node_affinity
  }

  pub fn set_node_affinity(&mut self, affinity: NodeAffinity) {
    self.node_affinity = affinity;
  }

  /// Content fingerprint of the evaluated state, used in logs to tell snapshots apart.
  pub fn fingerprint(&self) -> Fingerprint {
    #[derive(Serialize)]
    struct View<'a> {
      properties: Vec<(&'a str, &'a str)>,
      items: &'a [ItemInstance],
    }
    let view = View {
      properties: self.properties.iter().collect(),
      items: &self.items,
    };
    fingerprint(&view)
  }
}
