//! Assembly references of a project.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::consts::REFERENCE_ITEM;
use crate::property::PropertyStore;

pub const HINT_PATH_METADATA: &str = "HintPath";

/// A reference whose resolved location may change after a build.
pub trait ReferenceHandle {
  fn name(&self) -> String;

  fn resolved_path(&self) -> Option<PathBuf>;

  /// Re-resolve the reference against the file system.
  fn refresh_reference(&self) -> std::io::Result<()>;
}

pub trait ReferenceContainer {
  fn enum_references(&self) -> Vec<Rc<dyn ReferenceHandle>>;
}

/// Refresh every reference; failures are logged and skipped.
pub fn refresh_all(container: &dyn ReferenceContainer) -> usize {
  let mut refreshed = 0;
  for reference in container.enum_references() {
    match reference.refresh_reference() {
      Ok(()) => refreshed += 1,
      Err(e) => warn!(reference = %reference.name(), error = %e, "failed to refresh reference"),
    }
  }
  debug!(refreshed, "references refreshed");
  refreshed
}

#[derive(Debug)]
pub struct AssemblyReference {
  include: String,
  hint_path: Option<PathBuf>,
  resolved: RefCell<Option<PathBuf>>,
  refreshes: Cell<usize>,
}

impl AssemblyReference {
  fn new(include: &str, hint_path: Option<PathBuf>) -> Self {
    Self {
      include: include.to_string(),
      hint_path,
      resolved: RefCell::new(None),
      refreshes: Cell::new(0),
    }
  }

  pub fn hint_path(&self) -> Option<&PathBuf> {
    self.hint_path.as_ref()
  }

  /// Number of times this reference was refreshed.
  pub fn refreshes(&self) -> usize {
    self.refreshes.get()
  }
}

impl ReferenceHandle for AssemblyReference {
  fn name(&self) -> String {
    self.include.clone()
  }

  fn resolved_path(&self) -> Option<PathBuf> {
    self.resolved.borrow().clone()
  }

  fn refresh_reference(&self) -> std::io::Result<()> {
    self.refreshes.set(self.refreshes.get() + 1);
    let resolved = match &self.hint_path {
      Some(path) if path.try_exists()? => Some(dunce::canonicalize(path)?),
      _ => None,
    };
    self.resolved.replace(resolved);
    Ok(())
  }
}

/// References read from the project's `Reference` items.
///
/// Handles keep their identity across calls as long as the item does.
pub struct ProjectReferences {
  store: Rc<PropertyStore>,
  handles: RefCell<Vec<Rc<AssemblyReference>>>,
}

impl ProjectReferences {
  pub fn new(store: Rc<PropertyStore>) -> Self {
    Self {
      store,
      handles: RefCell::new(Vec::new()),
    }
  }

  pub fn references(&self) -> Vec<Rc<AssemblyReference>> {
    let items = self.store.items(REFERENCE_ITEM);
    let dir = self.store.project_dir();
    let mut handles = self.handles.borrow_mut();
    let next: Vec<Rc<AssemblyReference>> = items
      .iter()
      .map(|item| {
        let hint_path = item
          .metadata(HINT_PATH_METADATA)
          .filter(|h| !h.trim().is_empty())
          .map(|h| dir.join(h));
        handles
          .iter()
          .find(|h| h.include == item.include() && h.hint_path == hint_path)
          .cloned()
          .unwrap_or_else(|| Rc::new(AssemblyReference::new(item.include(), hint_path)))
      })
      .collect();
    *handles = next.clone();
    next
  }
}

impl ReferenceContainer for ProjectReferences {
  fn enum_references(&self) -> Vec<Rc<dyn ReferenceHandle>> {
    self
      .references()
      .into_iter()
      .map(|r| r as Rc<dyn ReferenceHandle>)
      .collect()
  }
}
