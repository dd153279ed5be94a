//! The query-edit gate consulted before any write to the project file.

use std::path::PathBuf;

use tracing::debug;

/// Decides whether files may be edited (source control checkout, read-only check).
pub trait EditGate {
  fn query_edit_files(&self, paths: &[PathBuf]) -> bool;
}

/// Allows every edit.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllEdits;

impl EditGate for AllowAllEdits {
  fn query_edit_files(&self, _paths: &[PathBuf]) -> bool {
    true
  }
}

/// Denies edits to files that exist and are marked read-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlyGate;

impl EditGate for ReadOnlyGate {
  fn query_edit_files(&self, paths: &[PathBuf]) -> bool {
    paths.iter().all(|path| match std::fs::metadata(path) {
      Ok(meta) if meta.permissions().readonly() => {
        debug!(path = %path.display(), "edit denied: file is read-only");
        false
      }
      _ => true,
    })
  }
}
