use std::path::Path;

use anyhow::{Context, Result};

use projsys_lib::project::RenameOutcome;

use super::Session;
use crate::output::{print_info, print_success, symbols};

pub fn cmd_rename(project: Option<&Path>, old: &Path, new: &Path) -> Result<()> {
  let session = Session::open(project)?;
  let cwd = std::env::current_dir()
    .and_then(dunce::canonicalize)
    .context("Failed to read current directory")?;
  let old = cwd.join(old);
  let new = cwd.join(new);

  let outcome = session
    .node
    .rename_document(&old, &new)
    .with_context(|| format!("Failed to rename {}", old.display()))?;

  let arrow = format!("{} {} {}", old.display(), symbols::ARROW, new.display());
  match outcome {
    RenameOutcome::Unchanged => {
      print_info("Nothing to rename");
      return Ok(());
    }
    RenameOutcome::RenamedSameIdentity => print_success(&format!("Renamed {arrow} (case only)")),
    RenameOutcome::RenamedNewIdentity(item) => print_success(&format!("Renamed {arrow} as item {}", item.id())),
  }
  session.save()
}
