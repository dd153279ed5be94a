//! Adding and removing project items.
//!
//! Both operations run with evaluation suspended and ask for reference
//! resolution while suspended, so the resolve target runs once, at resume.

use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{info, warn};

use crate::consts::RESOLVE_REFERENCES_TARGET;
use crate::engine::ItemDef;
use crate::output::OutputBuilder;
use crate::transaction::try_with;

use super::ProjectError;
use super::hierarchy::ItemNode;
use super::node::ProjectNode;

pub(super) fn add_existing_item(node: &ProjectNode, source: &Path, item_type: &str) -> Result<Rc<ItemNode>, ProjectError> {
  let dir = node.project_dir();
  let source = if source.is_absolute() {
    source.to_path_buf()
  } else {
    dir.join(source)
  };
  if !source.is_file() {
    return Err(ProjectError::ItemNotFound(source));
  }
  let inside = source.starts_with(&dir);
  let target = match (inside, source.file_name()) {
    (true, _) => source.clone(),
    (false, Some(name)) => dir.join(name),
    (false, None) => return Err(ProjectError::ItemNotFound(source)),
  };
  if node.hierarchy().find_by_path(&target).is_some() || (!inside && target.exists()) {
    return Err(ProjectError::ItemExists(target));
  }
  node.store().query_edit()?;

  let include = target
    .strip_prefix(&dir)
    .unwrap_or(&target)
    .to_string_lossy()
    .replace('\\', "/");

  suspended(node, || {
    try_with(
      || {
        if inside {
          return Ok(false);
        }
        std::fs::copy(&source, &target).map(|_| true).map_err(|e| io_error(&target, e))
      },
      |copied| {
        if copied {
          std::fs::remove_file(&target).map_err(|e| io_error(&target, e))?;
        }
        Ok(())
      },
      |_| {
        node
          .store()
          .edit_file(|file| file.items.push(ItemDef::new(item_type, include.as_str())))?;
        let item = node.hierarchy().create_node(item_type, &include, Default::default());
        node.hierarchy().add(item.clone(), None);
        request_reference_resolution(node)?;
        info!(item_type, include = %include, "item added");
        Ok(item)
      },
    )
  })
}

pub(super) fn remove_item(node: &ProjectNode, item: &Rc<ItemNode>, delete_from_disk: bool) -> Result<(), ProjectError> {
  let hierarchy = node.hierarchy();
  if !hierarchy.contains(item) {
    return Err(ProjectError::ItemNotFound(item.full_path()));
  }
  node.store().query_edit()?;

  let mut subtree = vec![item.clone()];
  let mut index = 0;
  while index < subtree.len() {
    let children = subtree[index].children();
    subtree.extend(children);
    index += 1;
  }

  suspended(node, || {
    try_with(
      || {
        hierarchy
          .remove(item)
          .ok_or_else(|| ProjectError::ItemNotFound(item.full_path()))
      },
      |slot| {
        hierarchy.restore(item.clone(), &slot);
        Ok(())
      },
      |_| {
        try_with(
          || {
            node.store().edit_file(|file| {
              let mut removed = Vec::new();
              let mut position = 0;
              file.items.retain(|def| {
                let hit = subtree
                  .iter()
                  .any(|n| n.item_type() == def.item_type && n.include() == def.include);
                if hit {
                  removed.push((position, def.clone()));
                }
                position += 1;
                !hit
              });
              removed
            })
            .map_err(ProjectError::from)
          },
          |removed| {
            node.store().edit_file(|file| {
              for (position, def) in removed {
                let position = position.min(file.items.len());
                file.items.insert(position, def);
              }
            })?;
            Ok(())
          },
          |_| {
            if delete_from_disk {
              for doomed in &subtree {
                delete_file(&doomed.full_path())?;
              }
            }
            request_reference_resolution(node)?;
            info!(include = %item.include(), delete_from_disk, "item removed");
            Ok(())
          },
        )
      },
    )
  })
}

/// Run `f` with evaluation suspended; the resume happens whether `f` succeeds or not.
fn suspended<T>(node: &ProjectNode, f: impl FnOnce() -> Result<T, ProjectError>) -> Result<T, ProjectError> {
  node.suspend_msbuild();
  let result = f();
  let active = node.active_configuration();
  match node.resume_msbuild(&active, RESOLVE_REFERENCES_TARGET) {
    Ok(Some(resolved)) if !resolved.is_successful() => {
      warn!(outcome = %resolved.outcome(), "reference resolution after item change did not succeed");
    }
    Err(e) => warn!(error = %e, "reference resolution after item change failed"),
    _ => {}
  }
  result
}

fn request_reference_resolution(node: &ProjectNode) -> Result<(), ProjectError> {
  let active = node.active_configuration();
  if node.configuration(&active).has_target(RESOLVE_REFERENCES_TARGET) {
    node.call_msbuild(&active, RESOLVE_REFERENCES_TARGET)?;
  }
  Ok(())
}

fn delete_file(path: &Path) -> Result<(), ProjectError> {
  match std::fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(io_error(path, e)),
  }
}

fn io_error(path: &Path, source: io::Error) -> ProjectError {
  ProjectError::Io {
    path: PathBuf::from(path),
    source,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::TestProject;
  use tempfile::TempDir;

  const PROJECT: &str = r#"{
    "items": [
      { "type": "Compile", "include": "Form.cs" },
      { "type": "Compile", "include": "Form.Designer.cs", "metadata": { "DependentUpon": "Form.cs" } }
    ],
    "targets": {
      "ResolveAssemblyReferences": {
        "tasks": [ { "task": "message", "text": "resolved references", "importance": "high" } ]
      }
    }
  }"#;

  fn resolutions(project: &TestProject) -> usize {
    project
      .output
      .lines()
      .iter()
      .filter(|l| l.as_str() == "resolved references")
      .count()
  }

  #[test]
  fn adding_an_outside_file_copies_it_in() {
    let project = TestProject::new(PROJECT);
    let outside = TempDir::new().unwrap();
    let source = outside.path().join("Util.cs");
    std::fs::write(&source, "class Util {}").unwrap();

    let item = project.node.add_existing_item(&source, "Compile").unwrap();
    assert_eq!(item.include(), "Util.cs");
    assert!(project.path("Util.cs").is_file());
    assert!(project.node.hierarchy().contains(&item));
    assert!(project.node.store().with_file(|f| f.items.iter().any(|d| d.include == "Util.cs")));
    assert_eq!(resolutions(&project), 1);
    assert!(!project.node.coordinator().is_suspended());
  }

  #[test]
  fn adding_twice_is_refused() {
    let project = TestProject::new(PROJECT);
    let source = project.write("Form.cs", "class Form {}");
    assert!(matches!(
      project.node.add_existing_item(&source, "Compile"),
      Err(ProjectError::ItemExists(_))
    ));
    assert!(matches!(
      project.node.add_existing_item(Path::new("Nope.cs"), "Compile"),
      Err(ProjectError::ItemNotFound(_))
    ));
    assert_eq!(resolutions(&project), 0);
  }

  #[test]
  fn removing_takes_dependents_along() {
    let project = TestProject::new(PROJECT);
    project.write("Form.cs", "class Form {}");
    project.write("Form.Designer.cs", "partial class Form {}");
    let form = project.node.hierarchy().find_by_path(Path::new("Form.cs")).unwrap();

    project.node.remove_item(&form, true).unwrap();
    assert!(project.node.hierarchy().all().is_empty());
    assert!(project.node.store().with_file(|f| f.items.is_empty()));
    assert!(!project.path("Form.cs").exists());
    assert!(!project.path("Form.Designer.cs").exists());
    assert_eq!(resolutions(&project), 1);
  }

  #[test]
  fn nested_item_changes_resolve_once() {
    let project = TestProject::new(PROJECT);
    let first = project.write("A.cs", "");
    let second = project.write("B.cs", "");

    project.node.suspend_msbuild();
    project.node.add_existing_item(&first, "Compile").unwrap();
    project.node.add_existing_item(&second, "Compile").unwrap();
    assert_eq!(resolutions(&project), 0);
    let replayed = project
      .node
      .resume_msbuild(&project.node.active_configuration(), RESOLVE_REFERENCES_TARGET)
      .unwrap();
    assert!(replayed.unwrap().is_successful());
    assert_eq!(resolutions(&project), 1);
  }
}
