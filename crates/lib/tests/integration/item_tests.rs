//! Item mutations: rename, add and remove, and their rollback.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use projsys_lib::project::{DocumentError, DocumentTracker, RenameError, RenameOutcome, RenameStage};
use projsys_lib::transaction::try_with;

use super::common::TestEnv;

#[test]
fn failed_continuation_undoes_the_action() {
  let state = RefCell::new(vec!["a".to_string()]);
  let result: Result<(), String> = try_with(
    || {
      state.borrow_mut().push("b".to_string());
      Ok(())
    },
    |_| {
      state.borrow_mut().pop();
      Ok(())
    },
    |_| Err("continuation failed".to_string()),
  );
  assert_eq!(result, Err("continuation failed".to_string()));
  assert_eq!(*state.borrow(), vec!["a".to_string()]);
}

#[test]
fn case_only_rename_keeps_the_node() {
  let env = TestEnv::from_fixture("app.projsys.json");
  env.write_file("Form.cs", "class Form {}");
  let before = env.node.hierarchy().find_by_path(Path::new("Form.cs")).unwrap();

  let outcome = env
    .node
    .rename_document(&env.path("Form.cs"), &env.path("form.cs"))
    .unwrap();
  assert!(matches!(outcome, RenameOutcome::RenamedSameIdentity));

  let after = env.node.hierarchy().find_by_path(Path::new("form.cs")).unwrap();
  assert!(Rc::ptr_eq(&before, &after));
  assert_eq!(after.include(), "form.cs");
  // No disk rename happened: the file keeps its original name.
  let names: Vec<String> = std::fs::read_dir(env.node.project_dir())
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
    .collect();
  assert!(names.contains(&"Form.cs".to_string()));
}

#[test]
fn rename_moves_the_file_and_its_dependents() {
  let env = TestEnv::from_fixture("app.projsys.json");
  env.write_file("Form.cs", "class Form {}");
  env.write_file("Form.Designer.cs", "partial class Form {}");
  let before = env.node.hierarchy().find_by_path(Path::new("Form.cs")).unwrap();

  let outcome = env
    .node
    .rename_document(&env.path("Form.cs"), &env.path("Window.cs"))
    .unwrap();
  let RenamedNode(renamed) = RenamedNode::from(outcome);
  assert!(!Rc::ptr_eq(&before, &renamed));
  assert!(env.path("Window.cs").is_file());
  assert!(!env.path("Form.cs").exists());
  assert_eq!(renamed.children().len(), 1);

  let dependent = env.node.store().with_file(|file| {
    file
      .items
      .iter()
      .find(|d| d.include == "Form.Designer.cs")
      .and_then(|d| d.metadata.get("DependentUpon").cloned())
  });
  assert_eq!(dependent.as_deref(), Some("Window.cs"));
}

struct RenamedNode(Rc<projsys_lib::project::ItemNode>);

impl From<RenameOutcome> for RenamedNode {
  fn from(outcome: RenameOutcome) -> Self {
    match outcome {
      RenameOutcome::RenamedNewIdentity(node) => RenamedNode(node),
      other => panic!("expected a new identity, got {other:?}"),
    }
  }
}

struct LockedEditor {
  retargeted: RefCell<Vec<PathBuf>>,
}

impl DocumentTracker for LockedEditor {
  fn can_rename(&self, _old: &Path, _new: &Path) -> bool {
    true
  }

  fn retarget(&self, old: &Path, _new: &Path) -> Result<(), DocumentError> {
    self.retargeted.borrow_mut().push(old.to_path_buf());
    Err(DocumentError::Locked(old.to_path_buf()))
  }

  fn renamed(&self, _old: &Path, _new: &Path) {}
}

#[test]
fn failed_retarget_restores_the_file() {
  let editor = Rc::new(LockedEditor {
    retargeted: RefCell::new(Vec::new()),
  });
  let documents = editor.clone();
  let env = TestEnv::from_fixture_with("app.projsys.json", move |services| services.documents = documents);
  env.write_file("Program.cs", "class Program {}");
  let before = env.node.hierarchy().find_by_path(Path::new("Program.cs")).unwrap();

  let error = env
    .node
    .rename_document(&env.path("Program.cs"), &env.path("Main.cs"))
    .unwrap_err();
  assert!(matches!(
    error,
    RenameError::Failed {
      stage: RenameStage::DocumentRetarget,
      ..
    }
  ));
  assert_eq!(editor.retargeted.borrow().len(), 1);
  assert!(env.path("Program.cs").is_file());
  assert!(!env.path("Main.cs").exists());
  assert!(Rc::ptr_eq(
    &before,
    &env.node.hierarchy().find_by_path(Path::new("Program.cs")).unwrap()
  ));
  assert!(!env.node.is_dirty());
}

#[test]
fn add_then_remove_round_trips() {
  let env = TestEnv::from_fixture("app.projsys.json");
  let outside = tempfile::TempDir::new().unwrap();
  let source = outside.path().join("Helpers.cs");
  std::fs::write(&source, "static class Helpers {}").unwrap();

  let item = env.node.add_existing_item(&source, "Compile").unwrap();
  assert!(env.path("Helpers.cs").is_file());
  assert!(env.node.hierarchy().contains(&item));
  assert!(source.is_file());

  env.node.remove_item(&item, true).unwrap();
  assert!(!env.path("Helpers.cs").exists());
  assert!(!env.node.hierarchy().contains(&item));
  assert!(
    env
      .node
      .store()
      .with_file(|file| file.items.iter().all(|d| d.include != "Helpers.cs"))
  );
}
