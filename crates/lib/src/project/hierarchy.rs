//! The item tree shown under a project.
//!
//! Nodes are reference counted and keep their identity until they are
//! explicitly replaced: a reload re-uses the node of every item that is still
//! present. Items carrying `DependentUpon` metadata hang under the item they
//! name and move with it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::consts::{DEPENDENT_UPON_METADATA, REFERENCE_ITEM};
use crate::engine::ItemInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

pub struct ItemNode {
  id: ItemId,
  item_type: String,
  include: RefCell<String>,
  full_path: RefCell<PathBuf>,
  metadata: RefCell<BTreeMap<String, String>>,
  parent: RefCell<Weak<ItemNode>>,
  children: RefCell<Vec<Rc<ItemNode>>>,
}

impl fmt::Debug for ItemNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ItemNode")
      .field("id", &self.id)
      .field("item_type", &self.item_type)
      .field("include", &*self.include.borrow())
      .field("children", &self.children.borrow().len())
      .finish()
  }
}

impl ItemNode {
  pub fn id(&self) -> ItemId {
    self.id
  }

  pub fn item_type(&self) -> &str {
    &self.item_type
  }

  pub fn include(&self) -> String {
    self.include.borrow().clone()
  }

  pub fn full_path(&self) -> PathBuf {
    self.full_path.borrow().clone()
  }

  pub fn file_name(&self) -> String {
    self
      .full_path
      .borrow()
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default()
  }

  pub fn metadata(&self, name: &str) -> Option<String> {
    self
      .metadata
      .borrow()
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.clone())
  }

  pub fn all_metadata(&self) -> BTreeMap<String, String> {
    self.metadata.borrow().clone()
  }

  pub fn set_metadata(&self, name: &str, value: &str) {
    let mut metadata = self.metadata.borrow_mut();
    let key = metadata
      .keys()
      .find(|k| k.eq_ignore_ascii_case(name))
      .cloned()
      .unwrap_or_else(|| name.to_string());
    metadata.insert(key, value.to_string());
  }

  /// Change the include in place; the node keeps its identity.
  pub fn set_include(&self, include: &str, project_dir: &Path) {
    self.include.replace(include.to_string());
    self.full_path.replace(project_dir.join(include));
  }

  pub fn parent(&self) -> Option<Rc<ItemNode>> {
    self.parent.borrow().upgrade()
  }

  pub fn children(&self) -> Vec<Rc<ItemNode>> {
    self.children.borrow().clone()
  }

  fn directory(&self) -> PathBuf {
    self
      .full_path
      .borrow()
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default()
  }

  fn depends_on(&self, other: &ItemNode) -> bool {
    self
      .metadata(DEPENDENT_UPON_METADATA)
      .is_some_and(|name| self.directory().join(name) == *other.full_path.borrow())
  }
}

/// Where a node sat before it was removed.
#[derive(Debug, Clone)]
pub struct Slot {
  parent: Option<Rc<ItemNode>>,
  index: usize,
}

#[derive(Debug)]
pub struct Hierarchy {
  project_dir: PathBuf,
  roots: RefCell<Vec<Rc<ItemNode>>>,
  next_id: Cell<u32>,
}

impl Hierarchy {
  pub fn new(project_dir: &Path) -> Self {
    Self {
      project_dir: project_dir.to_path_buf(),
      roots: RefCell::new(Vec::new()),
      next_id: Cell::new(1),
    }
  }

  pub fn project_dir(&self) -> &Path {
    &self.project_dir
  }

  /// Create a detached node.
  pub fn create_node(&self, item_type: &str, include: &str, metadata: BTreeMap<String, String>) -> Rc<ItemNode> {
    let id = ItemId(self.next_id.get());
    self.next_id.set(id.0 + 1);
    Rc::new(ItemNode {
      id,
      item_type: item_type.to_string(),
      include: RefCell::new(include.to_string()),
      full_path: RefCell::new(self.project_dir.join(include)),
      metadata: RefCell::new(metadata),
      parent: RefCell::new(Weak::new()),
      children: RefCell::new(Vec::new()),
    })
  }

  /// Rebuild the tree from evaluated items, re-using nodes of items that are still present.
  pub fn populate(&self, items: &[ItemInstance]) {
    let previous = self.all();
    let nodes: Vec<Rc<ItemNode>> = items
      .iter()
      .filter(|item| item.item_type() != REFERENCE_ITEM)
      .map(|item| {
        let existing = previous
          .iter()
          .find(|n| n.item_type == item.item_type() && *n.include.borrow() == item.include());
        match existing {
          Some(node) => {
            node.metadata.replace(item.custom_metadata().clone());
            node.children.borrow_mut().clear();
            node.parent.replace(Weak::new());
            node.clone()
          }
          None => self.create_node(item.item_type(), item.include(), item.custom_metadata().clone()),
        }
      })
      .collect();

    let mut roots = Vec::new();
    for node in &nodes {
      let parent = nodes
        .iter()
        .find(|candidate| !Rc::ptr_eq(candidate, node) && node.depends_on(candidate) && !candidate.depends_on(node));
      match parent {
        Some(parent) => attach(parent, node.clone(), None),
        None => roots.push(node.clone()),
      }
    }
    self.roots.replace(roots);
  }

  pub fn roots(&self) -> Vec<Rc<ItemNode>> {
    self.roots.borrow().clone()
  }

  /// Every node, depth first.
  pub fn all(&self) -> Vec<Rc<ItemNode>> {
    fn walk(node: &Rc<ItemNode>, out: &mut Vec<Rc<ItemNode>>) {
      out.push(node.clone());
      for child in node.children.borrow().iter() {
        walk(child, out);
      }
    }
    let mut out = Vec::new();
    for root in self.roots.borrow().iter() {
      walk(root, &mut out);
    }
    out
  }

  /// Find a node by path, exact match first, then ignoring ASCII case.
  pub fn find_by_path(&self, path: &Path) -> Option<Rc<ItemNode>> {
    let path = self.absolute(path);
    let all = self.all();
    all
      .iter()
      .find(|n| *n.full_path.borrow() == path)
      .or_else(|| all.iter().find(|n| paths_equal_ignore_case(&n.full_path.borrow(), &path)))
      .cloned()
  }

  pub fn find(&self, id: ItemId) -> Option<Rc<ItemNode>> {
    self.all().into_iter().find(|n| n.id == id)
  }

  pub fn contains(&self, node: &Rc<ItemNode>) -> bool {
    self.all().iter().any(|n| Rc::ptr_eq(n, node))
  }

  /// Attach `node` under `parent`, or at the root when `None`.
  pub fn add(&self, node: Rc<ItemNode>, parent: Option<&Rc<ItemNode>>) {
    match parent {
      Some(parent) => attach(parent, node, None),
      None => self.roots.borrow_mut().push(node),
    }
  }

  /// Detach `node` and its subtree. Returns where it was.
  pub fn remove(&self, node: &Rc<ItemNode>) -> Option<Slot> {
    let parent = node.parent();
    let siblings = match &parent {
      Some(parent) => &parent.children,
      None => &self.roots,
    };
    let index = siblings.borrow().iter().position(|n| Rc::ptr_eq(n, node))?;
    siblings.borrow_mut().remove(index);
    node.parent.replace(Weak::new());
    Some(Slot { parent, index })
  }

  /// Put a removed node back where it was.
  pub fn restore(&self, node: Rc<ItemNode>, slot: &Slot) {
    match &slot.parent {
      Some(parent) => attach(parent, node, Some(slot.index)),
      None => {
        let mut roots = self.roots.borrow_mut();
        let index = slot.index.min(roots.len());
        roots.insert(index, node);
      }
    }
  }

  /// Swap `old` for `new` in place. Children of `old` move to `new`.
  pub fn replace(&self, old: &Rc<ItemNode>, new: Rc<ItemNode>) -> Option<Slot> {
    let slot = self.remove(old)?;
    move_children(old, &new);
    self.restore(new, &slot);
    Some(slot)
  }

  /// Undo [`replace`](Self::replace).
  pub fn unreplace(&self, new: &Rc<ItemNode>, old: Rc<ItemNode>, slot: &Slot) {
    self.remove(new);
    move_children(new, &old);
    self.restore(old, slot);
  }

  fn absolute(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.project_dir.join(path)
    }
  }
}

fn attach(parent: &Rc<ItemNode>, node: Rc<ItemNode>, index: Option<usize>) {
  node.parent.replace(Rc::downgrade(parent));
  let mut children = parent.children.borrow_mut();
  match index {
    Some(index) => {
      let index = index.min(children.len());
      children.insert(index, node);
    }
    None => children.push(node),
  }
}

fn move_children(from: &Rc<ItemNode>, to: &Rc<ItemNode>) {
  let children: Vec<Rc<ItemNode>> = from.children.borrow_mut().drain(..).collect();
  for child in children {
    attach(to, child, None);
  }
}

/// Equal paths up to ASCII letter case.
pub fn paths_equal_ignore_case(a: &Path, b: &Path) -> bool {
  a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(item_type: &str, include: &str, depends_on: Option<&str>) -> ItemInstance {
    let metadata: BTreeMap<String, String> = depends_on
      .map(|p| [(DEPENDENT_UPON_METADATA.to_string(), p.to_string())].into())
      .unwrap_or_default();
    ItemInstance::new(item_type, include.to_string(), metadata, Path::new("/proj"))
  }

  fn sample() -> Hierarchy {
    let hierarchy = Hierarchy::new(Path::new("/proj"));
    hierarchy.populate(&[
      item("Compile", "Form.cs", None),
      item("Compile", "Form.Designer.cs", Some("Form.cs")),
      item("EmbeddedResource", "Form.resx", Some("Form.cs")),
      item("Compile", "Program.cs", None),
      item("Reference", "System", None),
    ]);
    hierarchy
  }

  #[test]
  fn dependent_items_nest_under_their_parent() {
    let hierarchy = sample();
    let roots = hierarchy.roots();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].include(), "Form.cs");
    assert_eq!(roots[0].children().len(), 2);
    assert_eq!(roots[0].children()[0].parent().unwrap().id(), roots[0].id());
    assert_eq!(hierarchy.all().len(), 4);
  }

  #[test]
  fn repopulating_keeps_node_identity() {
    let hierarchy = sample();
    let program = hierarchy.find_by_path(Path::new("Program.cs")).unwrap();
    hierarchy.populate(&[item("Compile", "Program.cs", None), item("Compile", "Util.cs", None)]);
    assert!(Rc::ptr_eq(&program, &hierarchy.find_by_path(Path::new("/proj/Program.cs")).unwrap()));
    assert!(hierarchy.find_by_path(Path::new("Form.cs")).is_none());
  }

  #[test]
  fn lookup_falls_back_to_case_insensitive_match() {
    let hierarchy = sample();
    let node = hierarchy.find_by_path(Path::new("/proj/form.CS")).unwrap();
    assert_eq!(node.include(), "Form.cs");
  }

  #[test]
  fn replace_moves_children_and_unreplace_restores() {
    let hierarchy = sample();
    let form = hierarchy.find_by_path(Path::new("Form.cs")).unwrap();
    let renamed = hierarchy.create_node("Compile", "Window.cs", BTreeMap::new());

    let slot = hierarchy.replace(&form, renamed.clone()).unwrap();
    assert_eq!(renamed.children().len(), 2);
    assert!(form.children().is_empty());
    assert_eq!(hierarchy.roots()[0].id(), renamed.id());

    hierarchy.unreplace(&renamed, form.clone(), &slot);
    assert!(Rc::ptr_eq(&hierarchy.roots()[0], &form));
    assert_eq!(form.children().len(), 2);
    assert!(!hierarchy.contains(&renamed));
  }

  #[test]
  fn remove_and_restore_keep_position() {
    let hierarchy = sample();
    let form = hierarchy.find_by_path(Path::new("Form.cs")).unwrap();
    let designer = form.children()[0].clone();
    let slot = hierarchy.remove(&designer).unwrap();
    assert_eq!(form.children().len(), 1);
    hierarchy.restore(designer.clone(), &slot);
    assert!(Rc::ptr_eq(&form.children()[0], &designer));
  }
}
