//! Renaming a project item.
//!
//! A rename moves the file on disk, retargets open documents, swaps the
//! hierarchy node and finally rewrites the item in the project file. Each step
//! runs inside the continuation of the previous one's [`try_with`] scope, so a
//! failure undoes every earlier step, innermost first.
//!
//! A rename that only changes letter case keeps the node and the file as they
//! are and only updates the item.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::DEPENDENT_UPON_METADATA;
use crate::property::PropertyError;
use crate::transaction::try_with;

use super::hierarchy::{ItemNode, paths_equal_ignore_case};
use super::node::ProjectNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStage {
  DiskRename,
  DocumentRetarget,
  HierarchyReplace,
  ItemUpdate,
}

impl fmt::Display for RenameStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      RenameStage::DiskRename => "disk rename",
      RenameStage::DocumentRetarget => "document retarget",
      RenameStage::HierarchyReplace => "hierarchy replace",
      RenameStage::ItemUpdate => "item update",
    };
    f.write_str(name)
  }
}

#[derive(Debug)]
pub enum RenameOutcome {
  /// Old and new paths are identical.
  Unchanged,
  /// Only letter case changed; the node kept its identity.
  RenamedSameIdentity,
  /// The node was replaced by this one.
  RenamedNewIdentity(Rc<ItemNode>),
}

#[derive(Debug, Error)]
pub enum RenameError {
  #[error("{} is not part of the project", .0.display())]
  NotInProject(PathBuf),

  #[error("renaming {} was refused by an open editor", .0.display())]
  Refused(PathBuf),

  #[error("{} already exists", .0.display())]
  TargetExists(PathBuf),

  #[error(transparent)]
  Property(#[from] PropertyError),

  /// A step failed and every earlier step was rolled back.
  #[error("rename failed during {stage}")]
  Failed {
    stage: RenameStage,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

struct StepError {
  stage: RenameStage,
  source: Box<dyn std::error::Error + Send + Sync>,
}

impl StepError {
  fn new(stage: RenameStage, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    Self {
      stage,
      source: source.into(),
    }
  }
}

impl From<StepError> for RenameError {
  fn from(e: StepError) -> Self {
    RenameError::Failed {
      stage: e.stage,
      source: e.source,
    }
  }
}

pub(super) fn rename_document(node: &ProjectNode, old: &Path, new: &Path) -> Result<RenameOutcome, RenameError> {
  let dir = node.project_dir();
  let old = absolute(&dir, old);
  let new = absolute(&dir, new);
  let item = node
    .hierarchy()
    .find_by_path(&old)
    .ok_or_else(|| RenameError::NotInProject(old.clone()))?;
  if old == new {
    return Ok(RenameOutcome::Unchanged);
  }
  if !node.documents().can_rename(&old, &new) {
    return Err(RenameError::Refused(old));
  }
  node.store().query_edit()?;

  let old_include = item.include();
  let new_include = include_for(&dir, &new);

  if paths_equal_ignore_case(&old, &new) {
    rehome_item(node, &item, &old_include, &new_include).map_err(|e| StepError::new(RenameStage::ItemUpdate, e))?;
    item.set_include(&new_include, &dir);
    node.documents().renamed(&old, &new);
    info!(from = %old_include, to = %new_include, "item renamed (case only)");
    return Ok(RenameOutcome::RenamedSameIdentity);
  }

  if new.exists() {
    return Err(RenameError::TargetExists(new));
  }

  let documents = node.documents();
  let hierarchy = node.hierarchy();
  let renamed = try_with(
    || std::fs::rename(&old, &new).map_err(|e| StepError::new(RenameStage::DiskRename, e)),
    |()| {
      warn!(path = %new.display(), "moving file back");
      std::fs::rename(&new, &old).map_err(|e| StepError::new(RenameStage::DiskRename, e))
    },
    |_| {
      debug!(from = %old.display(), to = %new.display(), "file moved");
      try_with(
        || {
          documents
            .retarget(&old, &new)
            .map_err(|e| StepError::new(RenameStage::DocumentRetarget, e))
        },
        |()| {
          documents
            .retarget(&new, &old)
            .map_err(|e| StepError::new(RenameStage::DocumentRetarget, e))
        },
        |_| {
          try_with(
            || {
              let replacement = hierarchy.create_node(item.item_type(), &new_include, item.all_metadata());
              hierarchy
                .replace(&item, replacement.clone())
                .map(|slot| (replacement, slot))
                .ok_or_else(|| {
                  StepError::new(
                    RenameStage::HierarchyReplace,
                    format!("{old_include} is no longer in the hierarchy"),
                  )
                })
            },
            |(replacement, slot)| {
              hierarchy.unreplace(&replacement, item.clone(), &slot);
              Ok(())
            },
            |(replacement, _)| {
              rehome_item(node, replacement, &old_include, &new_include)
                .map(|()| replacement.clone())
                .map_err(|e| StepError::new(RenameStage::ItemUpdate, e))
            },
          )
        },
      )
    },
  )?;

  documents.renamed(&old, &new);
  info!(from = %old_include, to = %new_include, item = %renamed.id(), "item renamed");
  Ok(RenameOutcome::RenamedNewIdentity(renamed))
}

/// Point the item definition at `new_include` and its dependents at the new file name.
fn rehome_item(
  node: &ProjectNode,
  item: &Rc<ItemNode>,
  old_include: &str,
  new_include: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let old_name = file_name(old_include);
  let new_name = file_name(new_include);
  let dependents: Vec<String> = item.children().iter().map(|c| c.include()).collect();

  node.store().edit_file(|file| {
    for def in file.items.iter_mut() {
      if def.include == old_include && def.item_type == item.item_type() {
        def.include = new_include.to_string();
      } else if dependents.contains(&def.include)
        && let Some(parent) = def.metadata.get_mut(DEPENDENT_UPON_METADATA)
        && parent.eq_ignore_ascii_case(&old_name)
      {
        *parent = new_name.clone();
      }
    }
  })?;
  for child in item.children() {
    child.set_metadata(DEPENDENT_UPON_METADATA, &new_name);
  }
  Ok(())
}

fn absolute(dir: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    dir.join(path)
  }
}

/// Include for `path`: relative to the project directory when inside it, `/`-separated.
fn include_for(dir: &Path, path: &Path) -> String {
  path
    .strip_prefix(dir)
    .unwrap_or(path)
    .to_string_lossy()
    .replace('\\', "/")
}

fn file_name(include: &str) -> String {
  include.rsplit(['/', '\\']).next().unwrap_or(include).to_string()
}
