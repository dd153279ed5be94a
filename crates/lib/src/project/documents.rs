//! Open-document bookkeeping consulted while renaming items.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("document {} is locked by an editor", .0.display())]
  Locked(PathBuf),

  #[error("failed to retarget document {}: {message}", .path.display())]
  Retarget { path: PathBuf, message: String },
}

/// Tracks documents open in editors.
pub trait DocumentTracker {
  /// Whether `old` may be renamed to `new`. A refusal aborts the rename before any change.
  fn can_rename(&self, old: &Path, new: &Path) -> bool;

  /// Point the open document registered for `old` at `new`.
  fn retarget(&self, old: &Path, new: &Path) -> Result<(), DocumentError>;

  /// Called once a rename has been committed.
  fn renamed(&self, old: &Path, new: &Path);
}

/// No editors: every rename is allowed and nothing needs retargeting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDocuments;

impl DocumentTracker for NoDocuments {
  fn can_rename(&self, _old: &Path, _new: &Path) -> bool {
    true
  }

  fn retarget(&self, _old: &Path, _new: &Path) -> Result<(), DocumentError> {
    Ok(())
  }

  fn renamed(&self, _old: &Path, _new: &Path) {}
}
